//! Routes panics through `tracing::error!` instead of stderr so they land in
//! the same structured log stream as everything else, then aborts the
//! process: a panicked task left running with corrupted invariants is
//! worse than a clean restart.

pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!(%panic_info, "process panicked");
        default_hook(panic_info);
        std::process::exit(1);
    }));
}
