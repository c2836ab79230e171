use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use lutsynth_backend::{CallbackSlot, LoadMonitor, StreamControl, Wavetable, build_engine};
use lutsynth_core::{EngineConfig, OscId, TABLE_SIZE, Waveform};

#[test]
fn test_unity_increment_returns_to_start_after_one_table() {
    let (control, mut mixer) = build_engine(&EngineConfig::default());
    control.key_on(OscId::A, 1.0);

    let mut buffer = vec![0.0f32; 2 * TABLE_SIZE];
    mixer.render(&mut buffer, 2, TABLE_SIZE);

    assert_eq!(mixer.phases(OscId::A), (0.0, 0.0));
    assert!((control.elapsed_ms() - TABLE_SIZE as f64 / 48.0).abs() < 1e-9);
}

#[test]
fn test_silent_oscillators_stay_silent_at_any_gain() {
    let (control, mut mixer) = build_engine(&EngineConfig::default());
    control.set_master_amplitude(5.0);
    for id in OscId::ALL {
        control.set_waveform(id, Waveform::Silence);
        control.set_amplitude(id, 3.0);
        control.key_on(id, 2.5);
    }

    let mut buffer = vec![1.0f32; 2 * 512];
    for _ in 0..4 {
        mixer.render(&mut buffer, 2, 512);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}

#[test]
fn test_released_note_decays_to_silence() {
    let (control, mut mixer) = build_engine(&EngineConfig::default());
    control.set_master_amplitude(1.0);
    control.set_release_ms(OscId::A, 10.0);
    control.key_on(OscId::A, 1.0);

    let mut buffer = vec![0.0f32; 2 * 480];
    mixer.render(&mut buffer, 2, 480);
    assert!(buffer.iter().any(|&s| s != 0.0));

    control.key_off(OscId::A);
    // 10 ms at 48 kHz; one buffer to release, one to confirm silence
    mixer.render(&mut buffer, 2, 480);
    mixer.render(&mut buffer, 2, 480);
    assert!(buffer.iter().all(|&s| s == 0.0));
    assert_eq!(control.envelope_amplitude(OscId::A), 0.0);
}

#[test]
fn test_mixer_runs_against_concurrent_control_thread() {
    let config = EngineConfig::default();
    let (control, mixer) = build_engine(&config);
    let control = Arc::new(control);

    let monitor = Arc::new(LoadMonitor::new(config.buffer_frames as usize, config.sample_rate as f32, 0.1));
    let slot = Arc::new(CallbackSlot::new(
        Box::new(mixer),
        config.sample_rate as f32,
        2,
        Arc::clone(&monitor),
    ));
    let running = Arc::new(AtomicBool::new(true));

    let audio = {
        let slot = Arc::clone(&slot);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut buffer = vec![0.0f32; 2 * 128];
            let mut peak = 0.0f32;
            while running.load(Ordering::Acquire) {
                assert_eq!(slot.process_realtime(&mut buffer), StreamControl::Continue);
                for &sample in &buffer {
                    assert!(sample.is_finite());
                    peak = peak.max(sample.abs());
                }
            }
            peak
        })
    };

    for round in 0..200 {
        let id = OscId::ALL[round % 3];
        control.set_waveform(id, Waveform::ALL[round % Waveform::ALL.len()]);
        control.set_pulse_width(id, (round % 10) as f32 / 10.0);
        if round % 2 == 0 {
            control.key_on(id, 1.0 + (round % 12) as f32 / 12.0);
        } else {
            control.key_off(id);
        }
        control.reclaim_retired_tables();
    }
    running.store(false, Ordering::Release);

    let peak = audio.join().expect("audio thread panicked");
    // three oscillators, unit amplitude, default master gain
    assert!(peak <= 3.0 * 0.1 + 1e-6);

    control.all_notes_off();
    slot.finish();
    assert!(monitor.snapshot().callbacks > 0);
    assert!(OscId::ALL.iter().all(|&id| !control.is_note_on(id)));
}

#[test]
fn test_control_mirror_matches_regenerated_table() {
    let (control, _mixer) = build_engine(&EngineConfig::default());
    control.set_waveform(OscId::C, Waveform::Sawtooth);
    assert_eq!(control.wavetable(OscId::C), Wavetable::new(Waveform::Sawtooth, 0.5));
}
