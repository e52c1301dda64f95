use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rxvc::api::{ChromaFormat, EncoderConfig, EncoderSettings};
use rxvc::{
    ChecksumMethod, Frame, OutputStatus, PictureDecoder, Restrictions, SegmentHeader,
    ThreadDecoder, XvceCtx,
};

/* moving gradient plus seeded noise; picture n is picture 0 shifted right */
fn test_frame(cfg: &EncoderConfig, seed: u64, pic_idx: usize) -> Frame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut frame = Frame::new(cfg.width, cfg.height, cfg.chroma_format, cfg.bit_depth);
    let max_val = (1i32 << cfg.bit_depth) - 1;
    let shift = (pic_idx * 2) as i32;
    for y in 0..cfg.height {
        for x in 0..cfg.width {
            let gx = x as i32 - shift;
            let base = (gx * 3 + y as i32 * 2) % (max_val + 1);
            let noise = rng.gen_range(-6i32..=6);
            frame.planes[0].data[y * cfg.width + x] =
                (base.abs() + noise).max(0).min(max_val) as u16;
        }
    }
    if cfg.chroma_format == ChromaFormat::CF_420 {
        let (cw, ch) = (cfg.width / 2, cfg.height / 2);
        for c in 1..3 {
            for y in 0..ch {
                for x in 0..cw {
                    let gx = x as i32 - shift / 2;
                    let base = (gx * 2 + y as i32 + c as i32 * 17) % (max_val + 1);
                    frame.planes[c].data[y * cw + x] = base.abs() as u16;
                }
            }
        }
    }
    frame
}

struct EncodedSequence {
    packets: Vec<Vec<u8>>,
    recons: Vec<Frame>,
    segment: SegmentHeader,
}

fn encode_sequence(cfg: &EncoderConfig, settings: &EncoderSettings, num_pics: usize,
                   seed: u64) -> EncodedSequence {
    let mut ctx = XvceCtx::new(cfg, settings).unwrap();
    let segment = ctx.segment_header();
    let mut packets = vec![];
    let mut recons = vec![];
    for n in 0..num_pics {
        let frame = test_frame(cfg, seed, n);
        let packet = ctx.encode_pic(&frame).unwrap();
        packets.push(packet.data);
        recons.push(ctx.get_reconstruction().clone());
    }
    EncodedSequence {
        packets,
        recons,
        segment,
    }
}

/* decode sequentially against the decoder's own reconstructions and demand
 * sample equality with the encoder side */
fn assert_reconstruction_equivalence(seq: &EncodedSequence) {
    Restrictions::set_current(seq.segment.restrictions);
    let mut refs: Vec<Arc<Frame>> = vec![];
    for (n, packet) in seq.packets.iter().enumerate() {
        let pic_dec = PictureDecoder::new();
        assert!(pic_dec.decode(&seq.segment, &seq.segment, packet, 0, &refs),
                "picture {} failed to decode", n);
        assert!(pic_dec.postprocess(&seq.segment, packet),
                "picture {} failed its checksum", n);
        let recon = pic_dec.get_reconstruction().unwrap();
        for c in 0..3 {
            assert_eq!(recon.planes[c].data, seq.recons[n].planes[c].data,
                       "picture {} component {} diverged", n, c);
        }
        refs = vec![recon];
    }
    Restrictions::set_current(Restrictions::default());
}

fn base_config() -> EncoderConfig {
    EncoderConfig {
        width: 96,
        height: 64,
        qp: 30,
        intra_period: 4,
        checksum_method: ChecksumMethod::Md5,
        ..Default::default()
    }
}

#[test]
fn encoder_decoder_reconstruction_equivalence() {
    let cfg = base_config();
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 4, 7);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_without_speed_ups() {
    let mut cfg = base_config();
    cfg.width = 64;
    let seq = encode_sequence(&cfg, &EncoderSettings::placebo(), 3, 11);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_with_non_strict_bit_counting() {
    let cfg = base_config();
    let mut settings = EncoderSettings::default();
    settings.strict_rdo_bit_counting = false;
    settings.count_actual_written_bits = false;
    let seq = encode_sequence(&cfg, &settings, 3, 13);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_with_secondary_chroma_tree() {
    let mut cfg = base_config();
    cfg.chroma_cu_tree = true;
    cfg.intra_period = 1;
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 2, 17);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_with_restricted_tools() {
    let mut cfg = base_config();
    cfg.restrictions.disable_ext2_inter_affine = true;
    cfg.restrictions.disable_ext2_inter_local_illumination_comp = true;
    cfg.restrictions.disable_transform_skip = true;
    cfg.restrictions.disable_ext_transform_select = true;
    cfg.restrictions.disable_ext_implicit_last_ctu = true;
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 3, 19);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_with_adaptive_qp() {
    let mut cfg = base_config();
    cfg.adaptive_qp = 1;
    let mut settings = EncoderSettings::default();
    settings.aqp_strength = 10;
    let seq = encode_sequence(&cfg, &settings, 3, 23);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_at_high_bitdepth() {
    let mut cfg = base_config();
    cfg.bit_depth = 10;
    cfg.width = 64;
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 2, 29);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn equivalence_for_monochrome() {
    let mut cfg = base_config();
    cfg.chroma_format = ChromaFormat::CF_MONO;
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 2, 31);
    assert_reconstruction_equivalence(&seq);
}

#[test]
fn tampered_checksum_fails_postprocess_only() {
    let cfg = base_config();
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 1, 37);
    let mut packet = seq.packets[0].clone();
    let last = packet.len() - 1;
    packet[last] ^= 0xff;

    let pic_dec = PictureDecoder::new();
    assert!(pic_dec.decode(&seq.segment, &seq.segment, &packet, 0, &[]));
    assert!(!pic_dec.postprocess(&seq.segment, &packet));
}

/*****************************************************************************
 * decoder pipeline
 *****************************************************************************/

fn all_intra_config() -> EncoderConfig {
    EncoderConfig {
        width: 64,
        height: 64,
        qp: 32,
        intra_period: 1,
        ..Default::default()
    }
}

#[test]
fn pending_work_respects_dependencies_and_allows_overtaking() {
    let cfg = all_intra_config();
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 3, 41);
    let segment = Arc::new(seq.segment.clone());

    let pool = ThreadDecoder::new(1);
    let blocker = Arc::new(PictureDecoder::new());
    let pic_a = Arc::new(PictureDecoder::new());
    let pic_b = Arc::new(PictureDecoder::new());
    let pic_c = Arc::new(PictureDecoder::new());

    /* a is gated on a picture that never gets decoded; b overtakes it */
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic_a),
                      vec![Arc::clone(&blocker)], seq.packets[0].clone(), 0);
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic_b),
                      vec![], seq.packets[1].clone(), 0);

    let mut order: Vec<u64> = vec![];
    pool.wait_one(&mut |pic, success, _deps| {
        assert!(success);
        order.push(pic.get_poc());
    });
    assert_eq!(order, vec![1], "the dependency-free picture must overtake");

    /* release the dependency; the stalled picture goes first again */
    blocker.set_output_status(OutputStatus::PostProcessing);
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic_c),
                      vec![], seq.packets[2].clone(), 0);
    pool.wait_all(&mut |pic, success, _deps| {
        assert!(success);
        order.push(pic.get_poc());
    });
    assert_eq!(order, vec![1, 0, 2]);
}

#[test]
fn checksum_failure_does_not_stall_downstream_pictures() {
    let mut cfg = base_config();
    cfg.width = 64;
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 2, 43);
    let segment = Arc::new(seq.segment.clone());

    let mut tampered = seq.packets[0].clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;

    let pool = ThreadDecoder::new(2);
    let pic0 = Arc::new(PictureDecoder::new());
    let pic1 = Arc::new(PictureDecoder::new());
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic0), vec![],
                      tampered, 0);
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic1),
                      vec![Arc::clone(&pic0)], seq.packets[1].clone(), 0);

    let mut results: Vec<(u64, bool)> = vec![];
    pool.wait_all(&mut |pic, success, _deps| {
        results.push((pic.get_poc(), success));
    });
    results.sort();
    assert_eq!(results, vec![(0, false), (1, true)]);

    /* the pool keeps accepting work afterwards */
    let extra = encode_sequence(&all_intra_config(), &EncoderSettings::default(), 1, 47);
    let extra_segment = Arc::new(extra.segment.clone());
    let pic2 = Arc::new(PictureDecoder::new());
    pool.decode_async(Arc::clone(&extra_segment), Arc::clone(&extra_segment),
                      Arc::clone(&pic2), vec![], extra.packets[0].clone(), 0);
    let mut extra_ok = false;
    pool.wait_one(&mut |_pic, success, _deps| {
        extra_ok = success;
    });
    assert!(extra_ok);
}

#[test]
fn wait_all_invokes_callback_once_per_submission() {
    let cfg = all_intra_config();
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 4, 53);
    let segment = Arc::new(seq.segment.clone());
    let pool = ThreadDecoder::new(3);
    for packet in seq.packets.iter() {
        pool.decode_async(Arc::clone(&segment), Arc::clone(&segment),
                          Arc::new(PictureDecoder::new()), vec![], packet.clone(), 0);
    }
    let mut count = 0;
    pool.wait_all(&mut |_pic, success, _deps| {
        assert!(success);
        count += 1;
    });
    assert_eq!(count, 4);
}

#[test]
fn wait_for_picture_drains_finished_work_in_order() {
    let cfg = all_intra_config();
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 2, 59);
    let segment = Arc::new(seq.segment.clone());
    let pool = ThreadDecoder::new(1);
    let pic0 = Arc::new(PictureDecoder::new());
    let pic1 = Arc::new(PictureDecoder::new());
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic0), vec![],
                      seq.packets[0].clone(), 0);
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment), Arc::clone(&pic1), vec![],
                      seq.packets[1].clone(), 0);

    pool.wait_for_picture(&pic1, &mut |pic, success, _deps| {
        assert!(success);
        /* the host outputs every drained picture immediately */
        pic.set_output_status(OutputStatus::HasNotBeenOutput);
    });
    assert_eq!(pic0.get_output_status(), OutputStatus::HasNotBeenOutput);
    assert_eq!(pic1.get_output_status(), OutputStatus::HasNotBeenOutput);
}

#[test]
fn stop_all_with_pending_work_shuts_down_cleanly() {
    let cfg = all_intra_config();
    let seq = encode_sequence(&cfg, &EncoderSettings::default(), 1, 61);
    let segment = Arc::new(seq.segment.clone());
    let mut pool = ThreadDecoder::new(2);
    let blocker = Arc::new(PictureDecoder::new());
    /* this item can never run; shutdown must abandon it without hanging */
    pool.decode_async(Arc::clone(&segment), Arc::clone(&segment),
                      Arc::new(PictureDecoder::new()), vec![blocker],
                      seq.packets[0].clone(), 0);
    pool.stop_all();
}
