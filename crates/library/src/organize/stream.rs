use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use crate::organize::file::{Action, Context, link_entry};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use hoard_index::Repository;

/// Linked rows are flagged in the index this many at a time.
pub const MARK_BATCH: usize = 1000;

/// Progress events emitted by [`organize`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of pending rows.
/// 3. [`Organized`](Self::Organized): zero or more times, one per row.
/// 4. [`LimitReached`](Self::LimitReached): at most once, when the size
///    limit stopped the run early.
/// 5. [`Complete`](Self::Complete): exactly once.
///
/// An index failure terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum OrganizeEvent {
    Started,
    DiscoveryComplete(u64),
    Organized(Action),
    /// Total bytes linked when the limit was exceeded.
    LimitReached(u64),
    /// Rows newly linked and their total size.
    Complete { linked: u64, size: u64 },
}

/// Streams [`OrganizeEvent`]s while linking every pending row of the index,
/// oldest first.
///
/// A row that fails to link surfaces as an `Err` item and stays pending; the
/// stream carries on with the next one. Rows that were linked (or found
/// linked already) are marked in batches of [`MARK_BATCH`].
pub fn organize<'a>(repo: &'a Repository, ctx: &'a Context) -> impl Stream<Item = LibraryResult<OrganizeEvent>> + 'a {
    stream! {
        for await event in organize_inner(repo, ctx) {
            yield event.or_raise(|| LibraryErrorKind::Organize);
        }
    }
}

fn organize_inner<'a>(repo: &'a Repository, ctx: &'a Context) -> impl Stream<Item = OrganizeResult<OrganizeEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(OrganizeEvent::Started);

        let entries = match repo.pending().await.or_raise(|| OrganizeErrorKind::Index) {
            Ok(entries) => entries,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(OrganizeEvent::DiscoveryComplete(u64::try_from(entries.len()).unwrap_or(u64::MAX)));

        let mut processed: Vec<i64> = Vec::with_capacity(MARK_BATCH);
        let (mut linked, mut size) = (0u64, 0u64);
        for entry in entries {
            match link_entry(ctx, &entry).await {
                Ok(action) => {
                    processed.push(entry.id);
                    if let Action::Linked { size: linked_size, .. } = &action {
                        linked += 1;
                        size += linked_size;
                    }
                    yield Ok(OrganizeEvent::Organized(action));
                },
                Err(e) => {
                    tracing::warn!(id = entry.id, path = %entry.path.display(), error = ?e, "Could not link entry");
                    yield Err(e);
                    continue;
                },
            }
            if size > ctx.size_limit {
                tracing::info!(size, limit = ctx.size_limit, "Size limit reached");
                yield Ok(OrganizeEvent::LimitReached(size));
                break;
            }
            if processed.len() >= MARK_BATCH {
                if let Err(e) = mark(repo, &mut processed).await {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Err(e) = mark(repo, &mut processed).await {
            yield Err(e);
            return;
        }

        tracing::info!(linked, size, "Linked files");
        yield Ok(OrganizeEvent::Complete { linked, size });
    })
}

async fn mark(repo: &Repository, ids: &mut Vec<i64>) -> OrganizeResult<()> {
    repo.mark_linked(ids).await.or_raise(|| OrganizeErrorKind::Index)?;
    ids.clear();
    Ok(())
}
