//! Performance benchmarks for the protocol hot paths

use client::Roster;
use protocol::packet::checksum;
use protocol::{parse_chat, parse_player_table, Packet, ReassemblyCache, ResponseBody};
use std::time::Instant;

fn player_table(rows: usize) -> String {
    let mut text = String::from(
        "Players on server:\n\
         [#] [IP Address]:[Port] [Ping] [GUID] [Name]\n\
         --------------------------------------------------\n",
    );
    for slot in 0..rows {
        text.push_str(&format!(
            "{}  10.0.{}.{}:2304  {}  {:032x}(OK)  Player {}\n",
            slot,
            slot / 256,
            slot % 256,
            30 + slot % 70,
            slot,
            slot
        ));
    }
    text.push_str(&format!("({} players in total)", rows));
    text
}

/// Benchmarks framing and checksumming of outgoing commands
#[test]
fn benchmark_packet_encoding() {
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let packet = Packet::Command {
            sequence: (i % 127) as u8,
            command: "say -1 Server restart in 5 minutes".to_string(),
        };
        let _ = packet.encode();
    }

    let duration = start.elapsed();
    println!(
        "Packet encoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks validation and decoding of a large server response
#[test]
fn benchmark_large_response_decoding() {
    let datagram = Packet::CommandResponse {
        sequence: 3,
        body: ResponseBody::Text(player_table(100)),
    }
    .encode();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let packet = Packet::decode_from_server(&datagram).unwrap();
        assert!(matches!(packet, Packet::CommandResponse { .. }));
    }

    let duration = start.elapsed();
    println!(
        "Response decoding ({} bytes): {} iterations in {:?} ({:.2} μs/iter)",
        datagram.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the CRC32 used on every datagram
#[test]
fn benchmark_checksum() {
    let payload = vec![0xABu8; 4096];
    let iterations = 2_000;
    let start = Instant::now();

    let mut accumulator = 0u32;
    for _ in 0..iterations {
        accumulator ^= checksum(&payload);
    }

    let duration = start.elapsed();
    println!(
        "Checksum (4 KiB): {} iterations in {:?} (acc {:08x})",
        iterations, duration, accumulator
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks parsing a full server's player listing
#[test]
fn benchmark_player_table_parsing() {
    let table = player_table(100);
    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let players = parse_player_table(&table);
        assert_eq!(players.len(), 100);
    }

    let duration = start.elapsed();
    println!(
        "Player table parsing: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks reassembly of responses split into many parts
#[test]
fn benchmark_multipart_reassembly() {
    let text = player_table(100);
    let fragments: Vec<&[u8]> = text.as_bytes().chunks(256).collect();
    let total = fragments.len() as u8;

    let iterations = 1_000;
    let start = Instant::now();

    let mut cache = ReassemblyCache::new();
    for i in 0..iterations {
        let sequence = (i % 127) as u8;
        let mut assembled = None;
        // Deliver in reverse to exercise out-of-order arrival
        for (index, fragment) in fragments.iter().enumerate().rev() {
            assembled = cache.insert(sequence, total, index as u8, fragment);
        }
        assert_eq!(assembled.as_deref(), Some(text.as_str()));
    }

    let duration = start.elapsed();
    println!(
        "Reassembly ({} parts): {} iterations in {:?}",
        total, iterations, duration
    );

    assert!(duration.as_millis() < 2000);
}

/// Stress test: chat-driven roster churn
#[test]
fn stress_test_roster_churn() {
    let mut roster = Roster::new();
    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let slot = i % 100;
        let connect = format!("Player #{} Player {} (10.0.0.{}:2304) connected", slot, slot, slot);
        let verify = format!("Verified GUID ({:032x}) of player #{} Player {}", slot, slot, slot);
        let disconnect = format!("Player #{} Player {} disconnected", slot, slot);

        for line in [&connect, &verify] {
            if let Some(notice) = parse_chat(line) {
                roster.apply_chat(notice);
            }
        }
        if i % 3 == 0 {
            if let Some(notice) = parse_chat(&disconnect) {
                roster.apply_chat(notice);
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Roster churn: {} iterations in {:?}, {} players left",
        iterations,
        duration,
        roster.len()
    );

    assert!(roster.len() <= 100);
    assert!(duration.as_millis() < 2000);
}
