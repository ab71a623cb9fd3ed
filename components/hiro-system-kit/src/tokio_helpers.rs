use std::future::Future;

/// Blocks on `future`, reusing the ambient runtime when called from within one.
pub fn nestable_block_on<F: Future>(future: F) -> F::Output {
    let (handle, _rt) = match tokio::runtime::Handle::try_current() {
        Ok(h) => (h, None),
        Err(_) => {
            let rt = tokio::runtime::Runtime::new().expect("unable to start tokio runtime");
            (rt.handle().clone(), Some(rt))
        }
    };
    handle.block_on(future)
}
