// Property-based tests for enumeration and propagation invariants.
//
// Two categories:
// 1. Range expansion: ascending, complete below the cap, empty when inverted
// 2. Resolution of generated chains: demand is always retired, runs are
//    reproducible, and computed items are never demanded again
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use cncd::blame::InverseOracle;
use cncd::context::{ContextParam, ContextValue, ContextValues};
use cncd::engine::EngineConfig;
use cncd::enumerate::expand;
use cncd::env::Env;
use cncd::interact::NonInteractive;
use cncd::load::load_str;
use cncd::parser::parse_tag_component;
use cncd::resolve::resolve;
use proptest::prelude::*;

// ── Range expansion ─────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn exclusive_range_is_ascending_and_complete(lo in -50i64..50, hi in -50i64..50) {
        let component = parse_tag_component(&format!("{lo} .. {hi}")).unwrap();
        let values: Vec<i64> = expand(&[component], &Env::new(), 1000)
            .map(|t| t.values()[0])
            .collect();
        let expected: Vec<i64> = (lo..hi).collect();
        prop_assert_eq!(values, expected);
    }

    #[test]
    fn inclusive_range_includes_end(lo in -50i64..50, hi in -50i64..50) {
        let component = parse_tag_component(&format!("{lo} ..= {hi}")).unwrap();
        let count = expand(&[component], &Env::new(), 1000).count();
        let expected = if lo > hi { 0 } else { (hi - lo + 1) as usize };
        prop_assert_eq!(count, expected);
    }

    #[test]
    fn product_respects_cap(a in 0i64..20, b in 0i64..20, limit in 1usize..10) {
        let tuple = vec![
            parse_tag_component(&format!("0 .. {a}")).unwrap(),
            parse_tag_component(&format!("0 .. {b}")).unwrap(),
        ];
        let tags: Vec<_> = expand(&tuple, &Env::new(), limit).collect();
        let expected = (a as usize).min(limit) * (b as usize).min(limit);
        prop_assert_eq!(tags.len(), expected);
        prop_assert!(tags.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn false_guard_yields_nothing(v in -100i64..100) {
        let component = parse_tag_component("i").unwrap().guarded(
            cncd::parser::parse_expr("i != i").unwrap(),
        );
        let env: Env = [("i".to_string(), v)].into();
        prop_assert_eq!(expand(&[component], &env, 10).count(), 0);
    }
}

// ── Generated chains ────────────────────────────────────────────────────────

/// A chain whose step `s(i)` consumes `x(i)` and produces `x(i + stride)`;
/// init provides `x(0 .. stride)` and finalize demands `x(#N)`.
fn chain(stride: i64) -> String {
    format!(
        r##"{{
            "context": [{{ "name": "N" }}],
            "items": [{{ "name": "x", "key": ["i"] }}],
            "steps": [{{
                "name": "s", "tag": ["i"],
                "inputs": [{{ "kind": "item", "collection": "x", "key": ["i"] }}],
                "outputs": [{{ "kind": "item", "collection": "x", "key": ["i + {stride}"] }}]
            }}],
            "init": {{ "outputs": [{{ "kind": "item", "collection": "x", "key": ["0 .. {stride}"] }}] }},
            "finalize": {{ "inputs": [{{ "kind": "item", "collection": "x", "key": ["#N"] }}] }}
        }}"##
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn chains_resolve_with_one_round_per_link(stride in 1i64..5, n in 0i64..60) {
        let graph = load_str(&chain(stride)).unwrap().graph;
        let mut ctx = ContextValues::default();
        ctx.insert(&ContextParam::int("N"), ContextValue::Known(n));
        let first = resolve(&graph, &ctx, EngineConfig::default(), InverseOracle::default(), NonInteractive).unwrap();
        let second = resolve(&graph, &ctx, EngineConfig::default(), InverseOracle::default(), NonInteractive).unwrap();

        prop_assert_eq!(first.iterations as i64, n / stride);
        // Only the residue class of N is computed beyond the seed values.
        let computed: Vec<i64> = first.compute.iter().map(|i| i.tag.values()[0]).collect();
        prop_assert!(computed.contains(&n));
        prop_assert!(computed.iter().all(|v| *v < stride || v % stride == n % stride));
        prop_assert_eq!(first, second);
    }
}
