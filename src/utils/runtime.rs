use anyhow::Result;

/// The host handles one event at a time. A current thread runtime keeps every handler on the
/// same thread, so the only points where another task can run are the awaits.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
