#[cfg(test)]
mod tests {
    use crate::Config;
    use crate::LooperProcessor;
    use crate::ParamDispatch;
    use crate::ParamId;
    use crate::RecordIntent;
    use crate::Sample;
    use crate::TransportInfo;
    use crate::Volume;

    // 400 Hz at 120 bpm: 200 samples per beat, 1600 sample loops.
    const SMALL_LOOP: usize = 1600;
    const BLOCK: usize = 100;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn small_config() -> Config {
        init_logging();
        Config {
            sample_rate: 400.0,
            fade_samples: 0,
            sync_group: None,
            ..Config::default()
        }
    }

    fn signal(n: usize) -> Sample {
        ((n * 7) % 200) as Sample / 200.0 - 0.5
    }

    /// Render `count` samples from `start` with a playing transport, feeding
    /// `signal` on the left and its inverse on the right.
    fn render(processor: &mut LooperProcessor, start: usize, count: usize, block: usize, bpm: f64) -> Vec<Sample> {
        let mut rendered = Vec::with_capacity(count);
        let mut position = start;
        while position < start + count {
            let left: Vec<Sample> = (position..position + block).map(signal).collect();
            let right: Vec<Sample> = left.iter().map(|s| -s).collect();
            let mut out_l = vec![0.0; block];
            let mut out_r = vec![0.0; block];
            let transport = TransportInfo::playing(bpm, position as i64);
            processor.process_block([&left, &right], [&mut out_l, &mut out_r], Some(&transport));
            rendered.extend_from_slice(&out_l);
            position += block;
        }
        rendered
    }

    #[test]
    fn recording_plays_back_one_loop_later() {
        init_logging();
        let config = Config { sync_group: None, ..Config::default() };
        let mut processor = LooperProcessor::new(config);

        // 44.1kHz at 120 bpm, 8 beats per loop.
        let loop_length = 176400;
        processor.toggle_record(0).unwrap();
        render(&mut processor, 0, loop_length, 400, 120.0);
        assert_eq!(processor.bank().loop_length(), loop_length);
        assert_eq!(processor.toggle_record(0).unwrap(), RecordIntent::Stop);

        let played = render(&mut processor, loop_length, 400, 400, 120.0);
        let recorded: Vec<Sample> = (0..10).map(signal).collect();
        assert_eq!(&played[..10], &recorded[..]);
    }

    #[test]
    fn recording_from_mid_loop_is_published_after_a_full_lap() {
        let mut processor = LooperProcessor::new(small_config());
        render(&mut processor, 0, 400, BLOCK, 120.0);

        processor.toggle_record(2).unwrap();
        render(&mut processor, 400, SMALL_LOOP, BLOCK, 120.0);
        // Only the partial first lap has been written.
        assert!(processor.bank().track_loop(2, 0).unwrap().as_slice().iter().all(|&s| s == 0.0));

        render(&mut processor, 400 + SMALL_LOOP, SMALL_LOOP, BLOCK, 120.0);
        processor.stop_record();
        // The lap between the first two loop starts after recording began.
        let published = processor.bank().track_loop(2, 0).unwrap();
        assert_eq!(published[0], signal(SMALL_LOOP));
        assert_eq!(published[SMALL_LOOP - 1], signal(2 * SMALL_LOOP - 1));
    }

    #[test]
    fn tempo_change_clears_loops() {
        let mut processor = LooperProcessor::new(small_config());
        processor.toggle_record(0).unwrap();
        render(&mut processor, 0, SMALL_LOOP, BLOCK, 120.0);
        processor.stop_record();
        assert_eq!(processor.bank().track_loop(0, 0).unwrap()[1], signal(1));

        // 400 Hz at 100 bpm is 240 samples per beat.
        let played = render(&mut processor, 0, BLOCK, BLOCK, 100.0);
        assert_eq!(processor.bank().loop_length(), 8 * 240);
        assert!(played.iter().all(|&s| s == 0.0));
        assert!(processor.bank().track_loop(0, 1).unwrap().as_slice().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stopped_transport_is_silent_and_keeps_loops() {
        let mut processor = LooperProcessor::new(small_config());
        let status = processor.status();
        processor.toggle_record(0).unwrap();
        render(&mut processor, 0, SMALL_LOOP, BLOCK, 120.0);
        assert_eq!(status.recording_index(), Some(0));
        assert_eq!(status.beat(), Some(7));

        let input = vec![0.5; BLOCK];
        let mut out_l = vec![1.0; BLOCK];
        let mut out_r = vec![1.0; BLOCK];
        processor.process_block([&input, &input], [&mut out_l, &mut out_r], None);
        assert!(out_l.iter().chain(out_r.iter()).all(|&s| s == 0.0));
        assert_eq!(status.recording_index(), None);
        assert_eq!(status.beat(), None);

        let stopped = TransportInfo::stopped();
        processor.process_block([&input, &input], [&mut out_l, &mut out_r], Some(&stopped));
        assert_eq!(processor.bank().recording_index(), None);

        let played = render(&mut processor, 0, BLOCK, BLOCK, 120.0);
        let recorded: Vec<Sample> = (0..BLOCK).map(signal).collect();
        assert_eq!(played, recorded);
    }

    #[test]
    fn parameters_drive_the_looper() {
        let mut processor = LooperProcessor::new(small_config());
        let mut params = ParamDispatch::new();

        params.dispatch(&mut processor, ParamId::Loop(1), 1.0).unwrap();
        render(&mut processor, 0, BLOCK, BLOCK, 120.0);
        assert_eq!(processor.bank().recording_index(), Some(1));

        // Resending the same value is not a press.
        params.dispatch(&mut processor, ParamId::Loop(1), 1.0).unwrap();
        render(&mut processor, BLOCK, BLOCK, BLOCK, 120.0);
        assert_eq!(processor.bank().recording_index(), Some(1));

        params.dispatch(&mut processor, ParamId::Loop(1), 0.0).unwrap();
        assert_eq!(processor.bank().recording_index(), None);

        params.dispatch(&mut processor, ParamId::Volume(3), 0.5).unwrap();
        assert_eq!(processor.bank().volume(3), Some(Volume::new(0.5)));
        assert_eq!(params.value(ParamId::Volume(3)), Some(0.5));

        params.dispatch(&mut processor, ParamId::Monitor(2), 1.0).unwrap();
        params.dispatch(&mut processor, ParamId::Monitor(4), 1.0).unwrap();
        assert_eq!(processor.bank().monitor_index(), Some(4));

        params.dispatch(&mut processor, ParamId::MuteInput, 1.0).unwrap();
        assert!(processor.bank().mute_input());

        assert!(params.dispatch(&mut processor, ParamId::Loop(9), 1.0).is_err());
        assert!(params.dispatch(&mut processor, ParamId::Volume(6), 1.0).is_err());
    }

    #[test]
    fn monitored_track_hears_input_at_its_gain() {
        let mut processor = LooperProcessor::new(small_config());
        processor.set_monitor(3, true).unwrap();
        let heard = render(&mut processor, 0, BLOCK, BLOCK, 120.0);
        assert_eq!(heard, (0..BLOCK).map(signal).collect::<Vec<_>>());

        processor.set_mute_input(true);
        let muted = render(&mut processor, 0, BLOCK, BLOCK, 120.0);
        assert!(muted.iter().all(|&s| s == 0.0));
        assert!(processor.status().input_rms() > 0.0);
    }

    #[test]
    fn instances_share_record_and_volume() {
        let config = || Config { sync_group: Some("test-processor-sync".to_string()), ..small_config() };
        let mut a = LooperProcessor::new(config());
        let mut b = LooperProcessor::new(config());
        assert!(a.is_leader());
        assert!(!b.is_leader());

        a.toggle_record(1).unwrap();
        a.set_volume(4, Volume::new(0.25)).unwrap();
        render(&mut a, 0, BLOCK, BLOCK, 120.0);
        render(&mut b, 0, BLOCK, BLOCK, 120.0);
        assert_eq!(a.bank().recording_index(), Some(1));
        assert_eq!(b.bank().recording_index(), Some(1));
        assert_eq!(b.bank().volume(4), Some(Volume::new(0.25)));
        assert_eq!(a.bank().volume(4), Some(Volume::new(0.25)));

        b.toggle_record(1).unwrap();
        render(&mut b, BLOCK, BLOCK, BLOCK, 120.0);
        render(&mut a, BLOCK, BLOCK, BLOCK, 120.0);
        assert_eq!(a.bank().recording_index(), None);
        assert_eq!(b.bank().recording_index(), None);

        let mut c = LooperProcessor::new(config());
        render(&mut c, 0, BLOCK, BLOCK, 120.0);
        assert_eq!(c.bank().volume(4), Some(Volume::new(0.25)));
        assert_eq!(c.bank().recording_index(), None);

        drop(a);
        render(&mut b, 2 * BLOCK, BLOCK, BLOCK, 120.0);
        assert!(b.is_leader());
        assert!(b.status().is_leader());
    }

    #[test]
    fn instance_joining_after_transport_stop_is_not_recording() {
        let config = || Config { sync_group: Some("test-join-after-stop".to_string()), ..small_config() };
        let mut a = LooperProcessor::new(config());
        a.toggle_record(1).unwrap();
        render(&mut a, 0, BLOCK, BLOCK, 120.0);
        assert_eq!(a.bank().recording_index(), Some(1));

        let input = vec![0.0; BLOCK];
        let mut out_l = vec![0.0; BLOCK];
        let mut out_r = vec![0.0; BLOCK];
        a.process_block([&input, &input], [&mut out_l, &mut out_r], None);
        assert_eq!(a.bank().recording_index(), None);

        let mut c = LooperProcessor::new(config());
        render(&mut a, 0, BLOCK, BLOCK, 120.0);
        render(&mut c, 0, BLOCK, BLOCK, 120.0);
        assert_eq!(a.bank().recording_index(), None);
        assert_eq!(c.bank().recording_index(), None);

        // Recording started after the join still reaches the new instance.
        a.toggle_record(2).unwrap();
        render(&mut a, BLOCK, BLOCK, BLOCK, 120.0);
        render(&mut c, BLOCK, BLOCK, BLOCK, 120.0);
        assert_eq!(a.bank().recording_index(), Some(2));
        assert_eq!(c.bank().recording_index(), Some(2));
    }
}
