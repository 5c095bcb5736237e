use picotag_rs::phy::payload::sequential_payload;
use picotag_rs::phy::{Level, MacFrame, PhyFrame};
use picotag_rs::radio::plan::TransmitProfile;

/// Undo the PIO word packing: MSB-first bits, one lead-in zero, then each
/// hold as (cycles - 4) / 2 one-bits and a terminating zero. Pad ones after
/// the last terminator carry no hold and are dropped.
fn unpack_holds(words: &[u32]) -> Vec<u32> {
    let mut bits = Vec::with_capacity(words.len() * 32);
    for word in words {
        for shift in (0..32).rev() {
            bits.push(((word >> shift) & 1) as u8);
        }
    }
    assert_eq!(bits[0], 0, "stream must open with the lead-in zero bit");

    let mut holds = Vec::new();
    let mut ones = 0u32;
    for &bit in &bits[1..] {
        if bit == 1 {
            ones += 1;
        } else {
            holds.push(4 + 2 * ones);
            ones = 0;
        }
    }
    holds
}

#[test]
fn default_packet_survives_word_packing() {
    let plan = TransmitProfile::Sys128Offset8.plan(2452).unwrap();
    let encoder = plan.wave_encoder().unwrap();

    let mac = MacFrame::new_data(1, sequential_payload(4));
    let frame = PhyFrame::new(&mac).unwrap();
    let encoded = encoder.encode_frame(&frame.to_bytes()).unwrap();

    // every hold survives the trip into words and back
    let holds = unpack_holds(&encoded.words);
    let levels: Vec<u32> = encoded.levels.iter().map(Level::cycles).collect();
    assert_eq!(holds, levels);

    // cycle accounting: lead-in hold plus every level
    let total: u64 = 4 + levels.iter().map(|&c| u64::from(c)).sum::<u64>();
    assert_eq!(encoded.total_cycles, total);

    // a four-byte payload is far inside the firmware's word buffer
    assert!(!encoded.overflows_device_buffer());
    assert!(encoded.words.len() < 2000);

    // sub-millisecond on air at the 128 MHz PIO clock
    let air_us = encoded.air_time_us(plan.pio_mhz);
    assert!(air_us > 100.0 && air_us < 1000.0, "air time {air_us} us");
}

#[test]
fn waveform_alternates_and_respects_minimum_hold() {
    let plan = TransmitProfile::Sys128Offset2.plan(2452).unwrap();
    let encoder = plan.wave_encoder().unwrap();

    let mac = MacFrame::new_data(7, sequential_payload(16));
    let frame = PhyFrame::new(&mac).unwrap();
    let encoded = encoder.encode_frame(&frame.to_bytes()).unwrap();

    for pair in encoded.levels.windows(2) {
        assert_ne!(
            pair[0].is_high(),
            pair[1].is_high(),
            "merged runs must alternate"
        );
    }
    for level in &encoded.levels {
        assert!(level.cycles() >= 4);
        assert_eq!(level.cycles() % 2, 0);
    }
}

#[test]
fn longer_payloads_cost_proportionally_more_air_time() {
    let plan = TransmitProfile::Sys128Offset8.plan(2452).unwrap();
    let encoder = plan.wave_encoder().unwrap();

    let cycles_for = |len: usize| {
        let mac = MacFrame::new_data(1, sequential_payload(len));
        let frame = PhyFrame::new(&mac).unwrap();
        encoder.encode_frame(&frame.to_bytes()).unwrap().total_cycles
    };

    let base = cycles_for(4);
    let bigger = cycles_for(36);
    // 32 extra bytes, 64 extra symbols, 1024 extra chip pairs; transition
    // interleaving doubles that, at 4 repetitions of 16 cycles per pair
    assert_eq!(bigger - base, 2 * 1024 * 4 * 16);
}
