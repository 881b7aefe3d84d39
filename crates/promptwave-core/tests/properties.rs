//! Property-based tests for promptwave-core value types.
//!
//! Covers the backoff formula, parameter clamping and prompt filtering using
//! proptest for randomized input generation.

use proptest::prelude::*;
use promptwave_core::{
    BRIGHTNESS_RANGE, DENSITY_RANGE, FilteredPromptRegistry, GUIDANCE_RANGE, ParameterSet,
    ParameterUpdate, Prompt, PromptSet, ReconnectDecision, ReconnectPolicy, TEMPO_RANGE,
};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// For every retry count below the limit, the delay is 2^n times the base.
    #[test]
    fn backoff_is_power_of_two(max in 1u32..12, n in 0u32..12) {
        let policy = ReconnectPolicy::new(max, Duration::from_secs(1));
        match policy.decide(n) {
            ReconnectDecision::Retry { attempt, delay } => {
                prop_assert!(n < max);
                prop_assert_eq!(attempt, n + 1);
                prop_assert_eq!(delay, Duration::from_secs(1u64 << n));
            }
            ReconnectDecision::Exhausted => prop_assert!(n >= max),
        }
    }

    /// Any finite update leaves every field inside its range.
    #[test]
    fn merged_parameters_stay_bounded(
        tempo in -1000.0f32..1000.0,
        guidance in -100.0f32..100.0,
        density in -10.0f32..10.0,
        brightness in -10.0f32..10.0,
    ) {
        let p = ParameterSet::default()
            .merge(&ParameterUpdate {
                tempo_bpm: Some(tempo),
                guidance: Some(guidance),
                density: Some(density),
                brightness: Some(brightness),
            })
            .parameters;
        prop_assert!(TEMPO_RANGE.contains(&p.tempo_bpm()));
        prop_assert!(GUIDANCE_RANGE.contains(&p.guidance()));
        prop_assert!(DENSITY_RANGE.contains(&p.density()));
        prop_assert!(BRIGHTNESS_RANGE.contains(&p.brightness()));
    }

    /// The active subset never contains a filtered or zero-weight prompt.
    #[test]
    fn active_subset_excludes_filtered(
        weights in prop::collection::vec(0.0f32..2.0, 1..8),
        filtered_mask in prop::collection::vec(any::<bool>(), 8),
    ) {
        let prompts: Vec<Prompt> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| Prompt::new(format!("prompt {i}"), *w).unwrap())
            .collect();
        let set = PromptSet::new(prompts);

        let mut registry = FilteredPromptRegistry::new();
        for (i, filtered) in filtered_mask.iter().enumerate() {
            if *filtered {
                registry.insert(format!("prompt {i}"));
            }
        }

        for prompt in set.active(&registry) {
            prop_assert!(prompt.weight() > 0.0);
            prop_assert!(!registry.contains(prompt.text()));
        }
        prop_assert_eq!(set.has_active(&registry), !set.active(&registry).is_empty());
    }
}

#[test]
fn prompt_set_deserialization_validates() {
    let ok: PromptSet =
        serde_json::from_str(r#"[{"text":"Funk","weight":1.0},{"text":"Ska","weight":0.2}]"#)
            .unwrap();
    assert_eq!(ok.len(), 2);

    let bad = serde_json::from_str::<PromptSet>(r#"[{"text":"  ","weight":1.0}]"#);
    assert!(bad.is_err());
}
