#[cfg(test)]
mod tests {
    use fx2la::dslogic::{DslogicMode, DslogicTestMode, FpgaSetting, TriggerPos};
    use fx2la::protocol::mhz;
    use fx2la::trigger::{TRIGGER_STAGES, Trigger, TriggerMode};

    fn word_at(image: &[u8], offset: usize) -> u16
    {
        u16::from_le_bytes([image[offset], image[offset + 1]])
    }

    #[test]
    fn setting_image_round_trips_the_scalar_fields()
    {
        let mut trigger = Trigger::new();
        trigger.enabled = true;
        trigger.set_position(50).unwrap();
        trigger.set_stages(3).unwrap();

        let setting = FpgaSetting::new(
            &trigger,
            DslogicMode::Logic,
            DslogicTestMode::None,
            false,
            mhz(50),
            10_000,
        );
        let image = setting.to_bytes();

        // mode word follows its 16-bit header at offset 4.
        assert_eq!(word_at(&image, 6), setting.mode);
        // divider: 100 MHz / 50 MHz.
        assert_eq!(setting.divider, 2);
        assert_eq!(&image[12..16], &2u32.to_le_bytes());
        // count, trig_pos and trig_adp carry the capture geometry.
        assert_eq!(&image[20..24], &10_000u32.to_le_bytes());
        assert_eq!(&image[28..32], &5_000u32.to_le_bytes());
        assert_eq!(word_at(&image, 34), 3);
        assert_eq!(&image[40..44], &4_999u32.to_le_bytes());
    }

    #[test]
    fn advanced_stage_words_serialise_in_stage_order()
    {
        let mut trigger = Trigger::new();
        trigger.mode = TriggerMode::Advanced;
        trigger.set_stage_pattern(5, "1", "0").unwrap();

        let setting = FpgaSetting::new(
            &trigger,
            DslogicMode::Logic,
            DslogicTestMode::None,
            false,
            mhz(100),
            0,
        );
        let image = setting.to_bytes();

        // Third group (value0) starts at 52 + 2 * 36; stage 5's word sits 4 + 5 * 2 in.
        let value0_stage5 = 52 + 2 * 36 + 4 + 5 * 2;
        assert_eq!(word_at(&image, value0_stage5), setting.value0[5]);
        assert_eq!(setting.value0[5] & 1, 1);
        assert_eq!(setting.mask0[5] & 1, 0);
    }

    #[test]
    fn simple_mode_sends_sixteen_parked_stages()
    {
        let setting = FpgaSetting::new(
            &Trigger::new(),
            DslogicMode::Logic,
            DslogicTestMode::None,
            false,
            mhz(100),
            0,
        );
        for stage in 1..TRIGGER_STAGES {
            assert_eq!(setting.mask0[stage], 1);
            assert_eq!(setting.logic0[stage], 2);
            assert_eq!(setting.value0[stage], 0);
        }
    }

    #[test]
    fn trigger_pos_report_is_one_512_byte_block()
    {
        assert_eq!(TriggerPos::BYTE_SIZE, 512);

        let mut bytes = vec![0u8; 512];
        bytes[0..4].copy_from_slice(&100u32.to_le_bytes());
        let report = TriggerPos::from_bytes(&bytes).unwrap();
        assert_eq!(report.real_pos, 100);
        assert_eq!(report.first_block.len(), 504);
    }
}
