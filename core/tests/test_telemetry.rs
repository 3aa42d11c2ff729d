#[cfg(test)]
mod tests {
    use std::time::Duration;

    use osci_core::telemetry::{Stage, StageTimes, TelemetryCounters, TelemetrySnapshot, TelemetryTimer};

    #[test]
    fn counters_accumulate_and_merge() {
        let mut a = TelemetryCounters::default();
        a.add_part();
        a.add_digest();
        a.add_xml(100);
        a.add_attachment(3000);
        a.add_frame(10, 26);
        a.add_terminator(16);

        let mut b = TelemetryCounters::default();
        b.add_frame(5, 21);
        b.add_attachment(1);

        a += b;
        assert_eq!(a.parts_composed, 1);
        assert_eq!(a.attachments, 2);
        assert_eq!(a.bytes_attachment, 3001);
        assert_eq!(a.frames_data, 2);
        assert_eq!(a.frames_terminator, 1);
        assert_eq!(a.bytes_plaintext, 15);
        assert_eq!(a.bytes_ciphertext, 26 + 16 + 21);
    }

    #[test]
    fn stage_times_add_up() {
        let mut times = StageTimes::default();
        times.add(Stage::Sign, Duration::from_millis(2));
        times.add(Stage::Sign, Duration::from_millis(3));
        times.add(Stage::Verify, Duration::from_micros(500));
        assert_eq!(times.get(Stage::Sign), Duration::from_millis(5));
        assert_eq!(times.get(Stage::Decrypt), Duration::ZERO);
        assert!((times.get_ms(Stage::Verify) - 0.5).abs() < 1e-9);
        assert_eq!(times.total(), Duration::from_micros(5500));
        assert!(times.has_all(&[Stage::Sign, Stage::Verify]));
        assert!(!times.has_all(&[Stage::Sign, Stage::Parse]));
        assert_eq!(times.iter().count(), 2);
    }

    #[test]
    fn snapshot_reflects_timer_and_counters() {
        let mut timer = TelemetryTimer::new();
        let answer = timer.time(Stage::Compose, || 6 * 7);
        assert_eq!(answer, 42);
        let mut counters = TelemetryCounters::default();
        counters.add_frame(4, 20);
        timer.finish();

        let snap = TelemetrySnapshot::from(&counters, &timer);
        assert!(snap.has_all_stages(&[Stage::Compose]));
        assert!(snap.sanity_check());
        assert_eq!(snap.elapsed, timer.elapsed());

        let json = serde_json::to_string(&snap).unwrap();
        let back: TelemetrySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn inconsistent_snapshot_fails_sanity() {
        let mut counters = TelemetryCounters::default();
        counters.bytes_plaintext = 10;
        counters.bytes_ciphertext = 5;
        let mut timer = TelemetryTimer::new();
        timer.finish();
        assert!(!TelemetrySnapshot::from(&counters, &timer).sanity_check());

        let mut timer = TelemetryTimer::new();
        timer.add_stage_time(Stage::Parse, Duration::from_secs(3600));
        timer.finish();
        assert!(!TelemetrySnapshot::from(&TelemetryCounters::default(), &timer).sanity_check());
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Serialize.to_string(), "serialize");
        assert_eq!(Stage::Decrypt.to_string(), "decrypt");
    }
}
