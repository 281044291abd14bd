use std::future::Future;

use futures::stream::{self, select_all, BoxStream, StreamExt};

use crate::error::DispatchError;
use crate::store::{Collection, DocumentStore};

struct LiveState<C, F, T> {
    changes: C,
    load: F,
    last: Option<T>,
    primed: bool,
}

/// Turn a one-shot loader into a live sequence of snapshots.
///
/// Emits the current snapshot straight away, then reloads after every change
/// notification for `collections`. A snapshot equal to the previous one is not
/// re-emitted. Load errors are yielded and the stream keeps watching. The
/// stream ends when the store stops reporting changes or the caller drops it.
pub fn live_snapshots<'a, T, F, Fut>(
    store: &'a dyn DocumentStore,
    collections: &[Collection],
    load: F,
) -> BoxStream<'a, Result<T, DispatchError>>
where
    T: Clone + PartialEq + Send + 'a,
    F: FnMut() -> Fut + Send + 'a,
    Fut: Future<Output = Result<T, DispatchError>> + Send + 'a,
{
    // Subscribe before the first load so no change slips between the two.
    let changes = select_all(collections.iter().map(|c| store.changes(*c)));
    let state = LiveState {
        changes,
        load,
        last: None,
        primed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.primed {
                state.changes.next().await?;
            }
            state.primed = true;

            match (state.load)().await {
                Ok(snapshot) => {
                    if state.last.as_ref() == Some(&snapshot) {
                        continue;
                    }
                    state.last = Some(snapshot.clone());
                    return Some((Ok(snapshot), state));
                }
                Err(e) => {
                    tracing::warn!("Live snapshot reload failed: {}", e);
                    // The next good load must be emitted even if it matches the last one.
                    state.last = None;
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}
