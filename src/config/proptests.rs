//! Property-based tests for config merging and launch planning
//!
//! These verify the merge/plan invariants hold across all possible inputs.

use super::*;
use proptest::prelude::*;

fn arb_arg() -> impl Strategy<Value = String> {
    "--[a-z][a-z-]{0,12}(=[a-z0-9]{0,6})?"
}

fn arb_args() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_arg(), 0..6)
}

fn arb_overrides() -> impl Strategy<Value = LaunchOverrides> {
    (
        prop::option::of(arb_args()),
        prop::option::of((320u32..4000, 240u32..3000)),
        prop::option::of(any::<bool>()),
        prop::option::of(arb_args()),
        prop::option::of(100u64..120_000),
    )
        .prop_map(
            |(args, viewport, headless, ignore_default_args, launch_timeout_ms)| LaunchOverrides {
                args,
                viewport: viewport.map(|(width, height)| ViewportSize { width, height }),
                headless,
                ignore_default_args,
                launch_timeout_ms,
            },
        )
}

proptest! {
    /// Merged args are always defaults followed by the override list —
    /// concatenation, never replacement.
    #[test]
    fn merged_args_are_defaults_then_override(overrides in arb_overrides()) {
        let defaults = ResolvedLaunch::default();
        let default_args = defaults.args.clone();
        let merged = defaults.merged_with(&overrides);

        prop_assert!(merged.args.starts_with(&default_args));
        match &overrides.args {
            Some(extra) => prop_assert!(merged.args.ends_with(extra)),
            None => prop_assert_eq!(&merged.args, &default_args),
        }
    }

    /// Scalar fields take the override value iff one was supplied.
    #[test]
    fn merged_scalars_follow_override(overrides in arb_overrides()) {
        let defaults = ResolvedLaunch::default();
        let merged = defaults.clone().merged_with(&overrides);

        prop_assert_eq!(merged.headless, overrides.headless.unwrap_or(defaults.headless));
        prop_assert_eq!(
            merged.viewport,
            overrides.viewport.unwrap_or(defaults.viewport)
        );
        match overrides.launch_timeout_ms {
            Some(ms) => prop_assert_eq!(merged.launch_timeout, Duration::from_millis(ms)),
            None => prop_assert_eq!(merged.launch_timeout, defaults.launch_timeout),
        }
    }

    /// No ignored entry ever survives into the final arg list.
    #[test]
    fn plan_never_contains_ignored_args(
        args in arb_args(),
        ignored in arb_args(),
        disable_info_bars in any::<bool>(),
    ) {
        let config = ProviderConfig {
            chromium: LaunchOverrides {
                args: Some(args),
                ignore_default_args: Some(ignored),
                ..LaunchOverrides::default()
            },
            disable_info_bars,
            ..ProviderConfig::default()
        };
        let plan = LaunchPlan::build("http://example.test/", &config);
        for ignored in &plan.ignored_default_args {
            prop_assert!(!plan.args.iter().any(|a| a == ignored));
        }
    }

    /// Plan building is a pure function of (url, config): no accumulation
    /// across repeated opens.
    #[test]
    fn plan_is_deterministic(overrides in arb_overrides(), app_mode in any::<bool>()) {
        let config = ProviderConfig {
            chromium: overrides,
            app_mode,
            ..ProviderConfig::default()
        };
        let first = LaunchPlan::build("http://example.test/", &config);
        let second = LaunchPlan::build("http://example.test/", &config);
        prop_assert_eq!(first, second);
    }

    /// App mode always suppresses the navigation step and vice versa.
    #[test]
    fn app_mode_and_navigation_are_exclusive(app_mode in any::<bool>()) {
        let config = ProviderConfig { app_mode, ..ProviderConfig::default() };
        let plan = LaunchPlan::build("http://example.test/", &config);
        prop_assert_eq!(plan.navigation_url.is_none(), app_mode);
        prop_assert_eq!(
            plan.args.iter().any(|a| a.starts_with("--app=")),
            app_mode
        );
    }
}
