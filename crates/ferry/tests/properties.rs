use proptest::prelude::*;

use ferry::{ErrorChannel, Handler, Outcome};
use ferry_test_utils::{ELine, Err1};

fn err1() -> impl Strategy<Value = Err1> {
    prop_oneof![Just(Err1::E1), Just(Err1::E2)]
}

proptest! {
    #[test]
    fn success_exposes_its_value(v in any::<i64>(), s in ".{0,32}") {
        let a = Outcome::success(v);
        prop_assert!(a.is_success());
        prop_assert_eq!(*a.value(), v);

        let b = Outcome::success(s.clone());
        prop_assert!(!b.is_failure());
        prop_assert_eq!(b.into_value(), s);
    }

    #[test]
    fn failure_ids_strictly_increase(n in 1usize..200) {
        let ch = ErrorChannel::new();
        let ids: Vec<_> = (0..n)
            .map(|_| ch.new_error::<(), _>(()).failure_id())
            .collect();
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(ch.last_id(), ids.last().copied());
    }

    #[test]
    fn propagate_keeps_the_failure_id(n in 1usize..20) {
        let ch = ErrorChannel::new();
        for _ in 1..n {
            let _ = ch.next_id();
        }
        let failed: Outcome<String> = ch.new_error(());
        let id = failed.failure_id();
        let relayed: Outcome<Vec<u8>> = failed.propagate();
        prop_assert_eq!(relayed.failure_id(), id);
    }

    #[test]
    fn resolution_is_deterministic(raised in err1(), line in 1u32..1000) {
        let run = || {
            let ch = ErrorChannel::new();
            ch.try_handle_all(
                || -> Outcome<String> { ch.new_error((raised, ELine(line))) },
                [
                    Handler::new(|_: &Err1, l: &ELine| format!("A{}", l.0)).matching([Err1::E1]),
                    Handler::new(|_: &Err1| "B".to_string()),
                ],
            )
        };
        let first = run();
        prop_assert_eq!(&first, &run());
        let expected = match raised {
            Err1::E1 => format!("A{line}"),
            Err1::E2 => "B".to_string(),
        };
        prop_assert_eq!(first, expected);
    }

    #[test]
    fn slots_balanced_after_any_nesting(depth in 0usize..12, fail_at in proptest::option::of(0usize..12)) {
        fn nest(ch: &ErrorChannel, level: usize, depth: usize, fail_at: Option<usize>) -> Outcome<usize> {
            if level == depth {
                return Outcome::success(level);
            }
            ch.try_handle_some(
                || {
                    if fail_at == Some(level) {
                        ch.new_error((ELine(level as u32),))
                    } else {
                        nest(ch, level + 1, depth, fail_at)
                    }
                },
                [Handler::new(|_: &ELine, _: &Err1| 0usize)],
            )
        }
        let ch = ErrorChannel::new();
        let out = nest(&ch, 0, depth, fail_at);
        prop_assert_eq!(ch.depth(), 0);
        prop_assert_eq!(out.is_failure(), fail_at.is_some_and(|f| f < depth));
    }
}
