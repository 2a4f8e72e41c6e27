use super::{StorageError, WordStore};

/// Copies the persisted counters and every record of `source` into `target`
/// and stores the target. Records already in `target` with the same token are
/// replaced. Returns the number of records copied.
pub fn convert<A, B>(source: &mut A, target: &mut B) -> Result<usize, StorageError>
where
    A: WordStore + ?Sized,
    B: WordStore + ?Sized,
{
    let state = source.load_state()?;
    let tokens = source.tokens()?;
    tracing::info!(
        target: "storage",
        nspam = state.nspam,
        nham = state.nham,
        words = tokens.len(),
        "converting word store"
    );

    let mut copied = 0;
    for token in tokens {
        if let Some(record) = source.get(&token)? {
            target.set(&token, record)?;
            copied += 1;
        }
    }
    target.store(&state)?;
    tracing::info!(target: "storage", copied, "conversion complete");
    Ok(copied)
}
