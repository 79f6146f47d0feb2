use std::time::Duration;

use enhook_core::{Options, adapt, install_host};
use enhook_host::*;

#[derive(Clone, Default)]
struct Theme {
    label: &'static str,
}

fn counter(theme: &Theme, step: &i32) -> String {
    let (count, set_count) = use_state(|| 0);
    let step = *step;
    use_effect_with(step, move || {
        log::info!("step changed to {step}");
        set_count.update(|c| c + step);
        on_cleanup(move || log::info!("step {step} retired"))
    });
    format!("{}: {count}", theme.label)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let rt = HookRuntime::batched();
    install_host(rt.as_host())?;

    let count = adapt(counter, Options::new().name("counter"))?;
    let theme = Theme { label: "count" };

    println!("{}", count.call_with(theme.clone(), 1)?);
    rt.frame();
    println!("{}", count.call_with(theme.clone(), 1)?);
    println!("{}", count.call_with(theme.clone(), 5)?);
    rt.frame();
    println!("{}", count.call_with(theme.clone(), 5)?);

    let weak = rt.downgrade();
    let clock = adapt(
        move |_: &(), _: &()| {
            let (seconds, set_seconds) = use_state(|| 0u32);
            let weak = weak.clone();
            use_effect(move || {
                weak.set_timeout(Duration::from_secs(1), move || {
                    set_seconds.update(|s| s + 1)
                });
            });
            seconds
        },
        Options::new().name("clock"),
    )?;
    clock.call(())?;
    rt.advance(Duration::from_millis(3500));
    println!("clock: {:?}", clock.last_value());

    count.unhook();
    clock.unhook();
    if let Err(err) = count.call_with(theme, 1) {
        println!("after unhook: {err}");
    }
    Ok(())
}
