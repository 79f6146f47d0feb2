use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::Duration;

use enhook_core::{
    EnhookError, Hooked, MountState, Options, RECURSION_LIMIT, RecursionLimitExceeded, adapt,
    install_host,
};

use crate::*;

const MODES: [RenderMode; 2] = [RenderMode::Sync, RenderMode::Batched];

type Log<T> = Rc<RefCell<Vec<T>>>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn on(rt: &HookRuntime) -> Options {
    Options::new().host(rt.as_host())
}

#[derive(Clone, Debug, PartialEq)]
struct Ctx {
    foo: i32,
}

#[derive(Clone, Debug, PartialEq)]
struct Props {
    bar: i32,
}

#[derive(Clone, Debug, PartialEq)]
enum Entry {
    Ctx(Ctx),
    Props(Props),
    Call(i32),
}

#[test]
fn context_and_args_replay_after_effect_update() {
    init_logger();
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<Entry> = Rc::default();
        let f = adapt(
            {
                let log = log.clone();
                move |ctx: &Ctx, props: &Props| {
                    log.borrow_mut().push(Entry::Ctx(ctx.clone()));
                    log.borrow_mut().push(Entry::Props(props.clone()));

                    let (count, set_count) = use_state(|| 0);
                    log.borrow_mut().push(Entry::Call(count));

                    use_effect_with((), move || set_count.set(1));
                    "result"
                }
            },
            on(&rt),
        )
        .unwrap();

        let res = f.call_with(Ctx { foo: 1 }, Props { bar: 2 }).unwrap();
        assert_eq!(res, "result");
        let first = vec![
            Entry::Ctx(Ctx { foo: 1 }),
            Entry::Props(Props { bar: 2 }),
            Entry::Call(0),
        ];
        assert_eq!(*log.borrow(), first, "{mode:?}: first call");

        rt.frames(4);
        let mut both = first.clone();
        both.extend([
            Entry::Ctx(Ctx { foo: 1 }),
            Entry::Props(Props { bar: 2 }),
            Entry::Call(1),
        ]);
        assert_eq!(*log.borrow(), both, "{mode:?}: after effect");
        assert_eq!(f.generation(), 1);
    }
}

fn call_then_effect(_: &(), (i, log): &(i32, Log<String>)) {
    log.borrow_mut().push(format!("call {i}"));
    let (i, log) = (*i, log.clone());
    use_effect_with((), move || log.borrow_mut().push(format!("effect {i}")));
}

#[test]
fn instances_of_one_function_do_not_share_state() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let (log1, log2): (Log<String>, Log<String>) = Default::default();
        let f1 = adapt(call_then_effect, on(&rt)).unwrap();
        let f2 = adapt(call_then_effect, on(&rt)).unwrap();

        f1.call((1, log1.clone())).unwrap();
        f2.call((2, log2.clone())).unwrap();
        rt.frames(3);

        assert_eq!(*log1.borrow(), ["call 1", "effect 1"], "{mode:?}");
        assert_eq!(*log2.borrow(), ["call 2", "effect 2"], "{mode:?}");
        assert_eq!(rt.mounted().len(), 2);
    }
}

#[test]
fn counters_in_separate_instances_evolve_separately() {
    let rt = HookRuntime::sync();
    let counter = |_: &(), step: &i32| {
        let (count, set_count) = use_state(|| 0);
        let step = *step;
        use_effect(move || set_count.update(|c| c + step));
        count
    };
    let a = adapt(counter, on(&rt)).unwrap();
    let b = adapt(counter, on(&rt)).unwrap();

    a.call(1).unwrap();
    b.call(10).unwrap();
    rt.frame();
    assert_eq!(a.call(1).unwrap(), 1);
    assert_eq!(b.call(10).unwrap(), 10);
}

#[test]
fn call_returns_the_value_of_its_own_render() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let f = adapt(
            |_: &(), x: &i32| {
                let (count, set_count) = use_state(|| 0);
                use_effect_with(*x, move || set_count.update(|c| c + 1));
                count * 10 + x
            },
            on(&rt),
        )
        .unwrap();

        assert_eq!(f.call(5).unwrap(), 5, "{mode:?}");
        rt.frame();
        assert_eq!(f.last_value(), Some(15), "{mode:?}: replayed with x = 5");
        assert_eq!(f.call(7).unwrap(), 17, "{mode:?}");
        rt.frame();
        assert_eq!(f.call(7).unwrap(), 27, "{mode:?}");
    }
}

#[test]
fn effects_without_deps_run_after_every_render() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<i32> = Rc::default();
        let f = adapt(
            {
                let log = log.clone();
                move |_: &(), _: &()| {
                    let log = log.clone();
                    use_effect(move || log.borrow_mut().push(1));
                }
            },
            on(&rt),
        )
        .unwrap();

        f.call(()).unwrap();
        f.call(()).unwrap();
        f.call(()).unwrap();
        rt.frames(4);
        assert_eq!(*log.borrow(), [1, 1, 1], "{mode:?}");
    }
}

#[test]
fn effects_induced_by_timers_rerender_each_time() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<i32> = Rc::default();
        let weak = rt.downgrade();
        let f = adapt(
            {
                let log = log.clone();
                move |_: &(), _: &()| {
                    let log = log.clone();
                    use_effect(move || log.borrow_mut().push(1));
                    let (_s, set_s) = use_state(|| 0);
                    for (delay, value) in [(0, 1), (15, 2), (30, 3)] {
                        let (set_s, rt) = (set_s.clone(), weak.clone());
                        use_effect_with((), move || {
                            rt.set_timeout(Duration::from_millis(delay), move || set_s.set(value));
                        });
                    }
                }
            },
            on(&rt),
        )
        .unwrap();

        f.call(()).unwrap();
        rt.advance(Duration::from_millis(150));
        assert_eq!(*log.borrow(), [1, 1, 1, 1], "{mode:?}");
        assert!(rt.is_idle());
    }
}

fn enter_and_leave(log: &Log<&'static str>) -> impl Fn(&(), &()) + 'static {
    let log = log.clone();
    move |_: &(), _: &()| {
        let (_a, _set) = use_state(|| ());
        let log = log.clone();
        use_effect(move || {
            log.borrow_mut().push("in");
            on_cleanup(move || log.borrow_mut().push("out"))
        });
    }
}

#[test]
fn unhook_runs_cleanup_once_and_blocks_further_calls() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<&'static str> = Rc::default();
        let f = adapt(enter_and_leave(&log), on(&rt).name("leaver")).unwrap();

        f.call(()).unwrap();
        rt.frames(2);
        assert_eq!(*log.borrow(), ["in"], "{mode:?}");

        f.unhook();
        rt.frames(2);
        assert_eq!(*log.borrow(), ["in", "out"], "{mode:?}");
        assert_eq!(f.state(), MountState::Destroyed);
        assert!(rt.mounted().is_empty());

        assert_eq!(
            f.call(()),
            Err(EnhookError::UseAfterDestroy {
                name: "leaver".into()
            })
        );
        f.unhook();
        rt.frames(2);
        assert_eq!(*log.borrow(), ["in", "out"], "{mode:?}: no second cleanup");
    }
}

#[test]
fn unhook_before_effect_commits_skips_both() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<&'static str> = Rc::default();
        let f = adapt(enter_and_leave(&log), on(&rt)).unwrap();

        f.call(()).unwrap();
        f.unhook();
        rt.frames(2);
        // Either order would be acceptable; this runtime drops uncommitted
        // effects, so neither side runs.
        assert!(log.borrow().is_empty(), "{mode:?}: {:?}", log.borrow());
        f.unhook();
        assert!(log.borrow().is_empty());
    }
}

#[test]
fn unhook_from_inside_a_render_waits_for_it_to_settle() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<&'static str> = Rc::default();
        let me: Rc<RefCell<Option<Hooked<(), bool, i32>>>> = Rc::default();
        let f = adapt(
            {
                let (log, me) = (log.clone(), me.clone());
                move |_: &(), quit: &bool| {
                    let log = log.clone();
                    use_layout_effect_with((), move || {
                        on_cleanup(move || log.borrow_mut().push("cleanup"))
                    });
                    if *quit && let Some(me) = me.borrow().as_ref() {
                        me.unhook();
                    }
                    7
                }
            },
            on(&rt),
        )
        .unwrap();
        *me.borrow_mut() = Some(f.clone());

        assert_eq!(f.call(false).unwrap(), 7);
        assert!(log.borrow().is_empty());

        assert_eq!(f.call(true).unwrap(), 7, "{mode:?}: in-flight render settles");
        assert_eq!(*log.borrow(), ["cleanup"], "{mode:?}");
        assert!(f.call(false).is_err());
        me.borrow_mut().take();
    }
}

#[test]
fn self_updating_function_is_bounded_per_tick() {
    init_logger();
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let count = Rc::new(Cell::new(0u32));
        let f = adapt(
            {
                let count = count.clone();
                move |_: &(), _: &()| {
                    let (c, set_c) = use_state(|| 0u32);
                    count.set(count.get() + 1);
                    set_c.set(c + 1);
                }
            },
            on(&rt),
        )
        .unwrap();

        f.call(()).unwrap();
        rt.run_microtasks();
        assert!(f.is_suspended(), "{mode:?}");
        assert_eq!(count.get(), 1 + RECURSION_LIMIT, "{mode:?}");
        assert!(!rt.is_idle(), "{mode:?}: held-back render pending");

        for _ in 0..8 {
            let before = count.get();
            let tick = rt.frame();
            assert_eq!(count.get() - before, RECURSION_LIMIT, "{mode:?}");
            assert_eq!(f.suspension().map(|w| w.tick), Some(tick));
        }

        f.unhook();
        let after = count.get();
        rt.frames(3);
        assert_eq!(count.get(), after, "{mode:?}");
        assert!(rt.is_idle());
    }
}

#[test]
fn bounded_self_update_finishes_on_a_later_tick() {
    init_logger();
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let f = adapt(
            |_: &(), _: &()| {
                let (n, set_n) = use_state(|| 0u32);
                if n < 30 {
                    set_n.set(n + 1);
                }
                n
            },
            on(&rt),
        )
        .unwrap();

        assert_eq!(f.call(()).unwrap(), 0);
        let tick = rt.frame();
        assert_eq!(f.last_value(), Some(RECURSION_LIMIT), "{mode:?}");
        assert_eq!(
            f.suspension(),
            Some(RecursionLimitExceeded {
                name: f.name().to_string(),
                tick,
                limit: RECURSION_LIMIT,
            })
        );

        rt.frames(20);
        assert_eq!(f.last_value(), Some(30), "{mode:?}");
        assert!(!f.is_suspended());
        assert!(rt.is_idle(), "{mode:?}");
    }
}

#[test]
fn passive_mode_coalesces_calls_into_the_next_render() {
    let rt = HookRuntime::batched();
    let log: Log<i32> = Rc::default();
    let f = adapt(
        {
            let log = log.clone();
            move |_: &(), _: &()| {
                let (count, set_count) = use_state(|| 0);
                log.borrow_mut().push(count);
                if log.borrow().len() < 10 {
                    set_count.set(1);
                }
                count
            }
        },
        on(&rt).passive(true),
    )
    .unwrap();

    // The first call has nothing to fall back on, so it waits.
    assert_eq!(f.call(()).unwrap(), 0);
    assert_eq!(*log.borrow(), [0]);

    // A render is already queued: later calls return the last value at once.
    assert_eq!(f.call(()).unwrap(), 0);
    assert_eq!(f.call(()).unwrap(), 0);
    assert_eq!(*log.borrow(), [0]);

    rt.frames(2);
    assert_eq!(*log.borrow(), [0, 1]);
    assert_eq!(f.last_value(), Some(1));
    assert_eq!(f.rendered_generation(), 3);

    assert_eq!(f.call(()).unwrap(), 1);
    rt.frame();
    assert_eq!(*log.borrow(), [0, 1, 1]);
}

#[test]
fn passive_mode_on_a_sync_host_returns_fresh_values() {
    let rt = HookRuntime::sync();
    let f = adapt(|_: &(), x: &i32| x * 3, on(&rt).passive(true)).unwrap();
    assert_eq!(f.call(1).unwrap(), 3);
    assert_eq!(f.call(2).unwrap(), 6);
}

#[test]
fn panic_in_a_self_triggered_render_is_contained() {
    init_logger();
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let f = adapt(
            |_: &(), _: &()| {
                let (count, set_count) = use_state(|| 0);
                if count == 1 {
                    panic!("bad state");
                }
                use_effect_with((), move || set_count.set(1));
                count
            },
            on(&rt),
        )
        .unwrap();

        assert_eq!(f.call(()).unwrap(), 0);
        rt.frames(2);
        assert_eq!(f.last_value(), Some(0), "{mode:?}");

        let caught = catch_unwind(AssertUnwindSafe(|| f.call(()))).unwrap_err();
        assert_eq!(caught.downcast_ref::<&str>(), Some(&"bad state"));
    }
}

#[test]
fn default_host_serves_adapters_without_options() {
    let rt = HookRuntime::batched();
    install_host(rt.as_host()).unwrap();

    let f = adapt(
        |_: &(), _: &()| {
            let (n, set_n) = use_state(|| 1);
            use_effect_with((), move || set_n.set(2));
            n
        },
        Options::new(),
    )
    .unwrap();
    assert_eq!(f.call(()).unwrap(), 1);
    rt.frame();
    assert_eq!(f.call(()).unwrap(), 2);
    assert!(install_host(HookRuntime::sync().as_host()).is_err());
}

#[test]
fn memo_recomputes_only_when_deps_change() {
    let rt = HookRuntime::sync();
    let computed = Rc::new(Cell::new(0));
    let f = adapt(
        {
            let computed = computed.clone();
            move |_: &(), x: &i32| {
                use_memo(*x, |x| {
                    computed.set(computed.get() + 1);
                    x * 2
                })
            }
        },
        on(&rt),
    )
    .unwrap();

    assert_eq!(f.call(1).unwrap(), 2);
    assert_eq!(f.call(1).unwrap(), 2);
    assert_eq!(f.call(4).unwrap(), 8);
    assert_eq!(computed.get(), 2);
}

#[derive(Clone, Copy)]
enum Action {
    Add(i32),
    Reset,
}

fn reduce(state: &i32, action: Action) -> i32 {
    match action {
        Action::Add(n) => state + n,
        Action::Reset => 0,
    }
}

#[test]
fn reducer_dispatch_rerenders_the_mount() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let f = adapt(|_: &(), _: &()| use_reducer(reduce, || 0), on(&rt)).unwrap();

        let (value, dispatch) = f.call(()).unwrap();
        assert_eq!(value, 0);
        dispatch.dispatch(Action::Add(3));
        dispatch.dispatch(Action::Add(4));
        rt.frame();
        assert_eq!(f.last_value().map(|(v, _)| v), Some(7), "{mode:?}");

        dispatch.dispatch(Action::Reset);
        rt.frame();
        assert_eq!(f.last_value().map(|(v, _)| v), Some(0), "{mode:?}");
    }
}

#[test]
fn refs_persist_without_rerendering() {
    let rt = HookRuntime::sync();
    let f = adapt(
        |_: &(), _: &()| {
            let renders = use_ref(|| 0);
            *renders.borrow_mut() += 1;
            let first = is_first_render();
            (*renders.borrow(), first)
        },
        on(&rt),
    )
    .unwrap();

    assert_eq!(f.call(()).unwrap(), (1, true));
    assert_eq!(f.call(()).unwrap(), (2, false));
    rt.frames(2);
    assert_eq!(f.last_value(), Some((2, false)));
}

#[test]
fn effect_cleanup_runs_before_rerun_and_on_unhook() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<String> = Rc::default();
        let f = adapt(
            {
                let log = log.clone();
                move |_: &(), x: &i32| {
                    let (x, log) = (*x, log.clone());
                    use_effect_with(x, move || {
                        log.borrow_mut().push(format!("run {x}"));
                        on_cleanup(move || log.borrow_mut().push(format!("clean {x}")))
                    });
                }
            },
            on(&rt),
        )
        .unwrap();

        f.call(1).unwrap();
        rt.frame();
        f.call(1).unwrap();
        rt.frame();
        f.call(2).unwrap();
        rt.frame();
        f.unhook();
        assert_eq!(
            *log.borrow(),
            ["run 1", "clean 1", "run 2", "clean 2"],
            "{mode:?}"
        );
    }
}

#[test]
fn layout_effects_commit_before_the_call_returns() {
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let log: Log<&'static str> = Rc::default();
        let f = adapt(
            {
                let log = log.clone();
                move |_: &(), _: &()| {
                    let (a, b, c) = (log.clone(), log.clone(), log.clone());
                    use_effect_with((), move || a.borrow_mut().push("effect"));
                    use_layout_effect_with((), move || b.borrow_mut().push("layout"));
                    use_layout_effect(move || c.borrow_mut().push("every"));
                }
            },
            on(&rt),
        )
        .unwrap();
        assert_eq!(rt.mode(), mode);

        f.call(()).unwrap();
        assert_eq!(*log.borrow(), ["layout", "every"], "{mode:?}");
        rt.frame();
        assert_eq!(*log.borrow(), ["layout", "every", "effect"], "{mode:?}");
        f.call(()).unwrap();
        assert_eq!(
            *log.borrow(),
            ["layout", "every", "effect", "every"],
            "{mode:?}"
        );
    }
}

#[test]
#[should_panic(expected = "called outside of a render")]
fn hooks_outside_a_render_panic() {
    let _ = use_state(|| 0);
}

#[test]
fn dropping_the_adapter_tears_the_mount_down() {
    let rt = HookRuntime::sync();
    let log: Log<&'static str> = Rc::default();
    let f = adapt(enter_and_leave(&log), on(&rt)).unwrap();
    f.call(()).unwrap();
    rt.frame();
    drop(f);
    assert_eq!(*log.borrow(), ["in", "out"]);
    assert!(rt.mounted().is_empty());
}

#[test]
fn render_count_tracks_external_and_self_triggered_renders() {
    let rt = HookRuntime::batched();
    let f = adapt(
        |_: &(), _: &()| {
            let (n, set_n) = use_state(|| 0);
            if n < 2 {
                set_n.set(n + 1);
            }
            n
        },
        on(&rt),
    )
    .unwrap();

    assert_eq!(f.call(()).unwrap(), 0);
    let target = rt.mounted()[0];
    assert_eq!(rt.render_count(target), Some(1));
    assert!(!rt.is_idle());

    let seen = Rc::new(Cell::new(None));
    rt.queue_microtask({
        let (rt, seen) = (rt.downgrade(), seen.clone());
        move || seen.set(rt.upgrade().and_then(|rt| rt.render_count(target)))
    });
    rt.run_microtasks();
    assert_eq!(rt.render_count(target), Some(3));
    assert_eq!(seen.get(), Some(2), "queued behind the first self-update");
    assert_eq!(f.last_value(), Some(2));
    assert!(rt.is_idle());

    f.unhook();
    assert_eq!(rt.render_count(target), None);
}

#[test]
fn unhook_cancels_a_render_still_queued_by_a_passive_call() {
    let rt = HookRuntime::batched();
    let runs = Rc::new(Cell::new(0));
    let log: Log<String> = Rc::default();
    let f = adapt(
        {
            let (runs, log) = (runs.clone(), log.clone());
            move |_: &(), x: &i32| {
                runs.set(runs.get() + 1);
                let (x, log) = (*x, log.clone());
                use_effect_with(x, move || {
                    log.borrow_mut().push(format!("run {x}"));
                    on_cleanup(move || log.borrow_mut().push(format!("clean {x}")))
                });
                x
            }
        },
        on(&rt).passive(true),
    )
    .unwrap();
    assert!(f.is_passive());

    assert_eq!(f.call(1).unwrap(), 1);
    assert_eq!(f.call(2).unwrap(), 1, "stale while the render is queued");
    assert!(!rt.is_idle());

    f.unhook();
    rt.frames(2);
    assert_eq!(runs.get(), 1);
    assert!(log.borrow().is_empty(), "{:?}", log.borrow());
    assert_eq!(f.last_value(), Some(1));
    assert!(rt.is_idle());
}

#[test]
fn many_calls_commit_one_effect_each() {
    const CALLS: usize = 100_000;
    for mode in MODES {
        let rt = HookRuntime::new(mode);
        let runs = Rc::new(Cell::new(0usize));
        let f = adapt(
            {
                let runs = runs.clone();
                move |_: &(), _: &()| {
                    let runs = runs.clone();
                    use_effect(move || runs.set(runs.get() + 1));
                }
            },
            on(&rt),
        )
        .unwrap();

        for _ in 0..CALLS {
            f.call(()).unwrap();
        }
        rt.frame();
        assert_eq!(runs.get(), CALLS, "{mode:?}");
        assert!(rt.is_idle());
    }
}
