use std::cmp::Ordering;

use async_stream::stream;
use futures_core::Stream;
use futures_util::future::poll_fn;

use super::{
    heap::IndexHeap,
    session::{poll_any_ready, Fetch, Session},
    ReaderError, SessionFactory, StoreStream,
};
use crate::{
    compare::{CompareError, KeyComparer},
    logging::rowmerge_log,
    merger::RowMerger,
    option::ReaderOptions,
    row::VersionedRow,
    value::UnversionedValue,
};

fn session_less(
    sessions: &[Session<'_, VersionedRow>],
    comparer: &KeyComparer,
    lhs: usize,
    rhs: usize,
) -> Result<bool, CompareError> {
    let ordering = comparer(sessions[lhs].current_key(), sessions[rhs].current_key())?;
    Ok(ordering.then(lhs.cmp(&rhs)) == Ordering::Less)
}

/// K-way merge over stores whose key ranges may overlap.
///
/// Stores are described by their lower key boundary and opened lazily: a
/// store's cursor is created once the merge key reaches its boundary, or
/// earlier when fewer than [`ReaderOptions::min_concurrency`] cursors are
/// open. Rows sharing a key across stores are folded through the merger, so
/// the emitted rows are ordered by key and never repeat one.
///
/// Every store must yield at most one row per key, in strictly increasing key
/// order, none of them below its boundary.
pub struct OverlappingRangeReader<'r, M> {
    sessions: Vec<Session<'r, VersionedRow>>,
    factory: SessionFactory<'r, VersionedRow>,
    merger: M,
    comparer: KeyComparer,
    options: ReaderOptions,
    active: IndexHeap,
    awaiting: Vec<usize>,
    next_session: usize,
    retired: usize,
    current_key: Vec<UnversionedValue>,
    row_count: usize,
}

impl<'r, M> OverlappingRangeReader<'r, M>
where
    M: RowMerger<Input = VersionedRow>,
{
    /// Reader over `boundaries.len()` stores; `factory(i)` opens the cursor of
    /// the store whose lower boundary is `boundaries[i]`.
    pub fn new<F>(
        boundaries: Vec<Vec<UnversionedValue>>,
        factory: F,
        merger: M,
        comparer: KeyComparer,
        options: ReaderOptions,
    ) -> Result<Self, ReaderError>
    where
        F: FnMut(usize) -> StoreStream<'r, VersionedRow> + Send + 'r,
    {
        // Stable insertion by boundary keeps equal boundaries in store order.
        let mut sessions: Vec<Session<'r, VersionedRow>> = Vec::with_capacity(boundaries.len());
        for (index, lower_bound) in boundaries.into_iter().enumerate() {
            let (mut low, mut high) = (0, sessions.len());
            while low < high {
                let middle = (low + high) / 2;
                if comparer(&sessions[middle].lower_bound, &lower_bound)? == Ordering::Greater {
                    high = middle;
                } else {
                    low = middle + 1;
                }
            }
            sessions.insert(low, Session::new(index, lower_bound));
        }

        let mut reader = Self {
            active: IndexHeap::with_capacity(sessions.len()),
            awaiting: Vec::with_capacity(sessions.len()),
            sessions,
            factory: Box::new(factory),
            merger,
            comparer,
            options,
            next_session: 0,
            retired: 0,
            current_key: Vec::new(),
            row_count: 0,
        };
        while reader.next_session < reader.sessions.len()
            && reader.next_session < reader.options.min_concurrency
        {
            reader.open_session(reader.next_session);
            reader.next_session += 1;
        }
        Ok(reader)
    }

    /// Resolves once a pending store fetch has completed, or immediately when
    /// no fetch is pending.
    pub async fn ready(&mut self) {
        poll_fn(|cx| poll_any_ready(&mut self.sessions, &self.awaiting, cx)).await
    }

    /// Fill `rows` with the next merged rows, at most
    /// [`ReaderOptions::batch_size`] of them. Returns `false` once every store
    /// is exhausted; `rows` is then empty.
    ///
    /// Rows from a previous call remain valid, but the merger is reset on
    /// entry.
    pub async fn read(&mut self, rows: &mut Vec<M::Output>) -> Result<bool, ReaderError> {
        rows.clear();
        self.merger.reset();

        loop {
            self.ready().await;
            self.refill()?;

            if self.active.is_empty() && self.awaiting.is_empty() {
                rowmerge_log!(
                    log::Level::Debug,
                    "reader_finished",
                    "row_count={} sessions={}",
                    self.row_count,
                    self.sessions.len()
                );
                return Ok(false);
            }

            self.drain(rows)?;
            if !rows.is_empty() {
                return Ok(true);
            }
        }
    }

    /// Read every remaining row.
    pub async fn read_all(&mut self) -> Result<Vec<M::Output>, ReaderError> {
        let mut all = Vec::new();
        let mut rows = Vec::with_capacity(self.options.batch_size);
        while self.read(&mut rows).await? {
            all.append(&mut rows);
        }
        Ok(all)
    }

    /// Turn the reader into a stream of merged rows. The stream ends after the
    /// first error.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<M::Output, ReaderError>> + 'r
    where
        M: 'r,
        M::Output: 'r,
    {
        stream! {
            let mut rows = Vec::with_capacity(self.options.batch_size);
            loop {
                match self.read(&mut rows).await {
                    Ok(true) => {
                        for row in rows.drain(..) {
                            yield Ok(row);
                        }
                    }
                    Ok(false) => break,
                    Err(error) => {
                        yield Err(error);
                        break;
                    }
                }
            }
        }
    }

    /// Rows emitted so far.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Whether every store cursor has been opened and run to completion.
    pub fn is_fetching_completed(&self) -> bool {
        self.retired == self.sessions.len()
    }

    fn open_session(&mut self, position: usize) {
        let index = self.sessions[position].index;
        let stream = (self.factory)(index);
        self.sessions[position].open(stream);
        self.awaiting.push(position);
        rowmerge_log!(
            log::Level::Trace,
            "session_opened",
            "store={} open={}",
            index,
            self.active.len() + self.awaiting.len()
        );
    }

    fn refill(&mut self) -> Result<(), ReaderError> {
        let mut cursor = 0;
        while cursor < self.awaiting.len() {
            let position = self.awaiting[cursor];
            let session = &mut self.sessions[position];
            match session.take_fetched() {
                None => cursor += 1,
                Some(Fetch::Rows(rows)) if rows.is_empty() => cursor += 1,
                Some(Fetch::Rows(rows)) => {
                    let ordering = (self.comparer)(rows[0].keys(), &session.lower_bound)?;
                    assert!(
                        ordering != Ordering::Less,
                        "store {} yielded a row below its lower boundary",
                        session.index
                    );
                    session.activate(rows);
                    self.awaiting.remove(cursor);
                    self.active.push(position, |lhs, rhs| {
                        session_less(&self.sessions, &self.comparer, lhs, rhs)
                    })?;
                }
                Some(Fetch::Exhausted) => {
                    session.close();
                    self.awaiting.remove(cursor);
                    self.retired += 1;
                    rowmerge_log!(
                        log::Level::Trace,
                        "session_exhausted",
                        "store={} retired={}",
                        session.index,
                        self.retired
                    );
                }
                Some(Fetch::Failed(source)) => {
                    rowmerge_log!(
                        log::Level::Warn,
                        "session_failed",
                        "store={} error={}",
                        session.index,
                        source
                    );
                    return Err(ReaderError::Store {
                        index: session.index,
                        source,
                    });
                }
            }
        }

        while self.active.len() + self.awaiting.len() < self.options.min_concurrency
            && self.next_session < self.sessions.len()
        {
            self.open_session(self.next_session);
            self.next_session += 1;
        }
        Ok(())
    }

    fn drain(&mut self, rows: &mut Vec<M::Output>) -> Result<(), ReaderError> {
        while self.awaiting.is_empty() && rows.len() < self.options.batch_size {
            let Some(top) = self.active.peek() else {
                break;
            };
            self.current_key.clear();
            self.current_key
                .extend_from_slice(self.sessions[top].current_key());

            // Stores starting at or below the merge key may hold rows for it.
            let first_unopened = self.next_session;
            while self.next_session < self.sessions.len()
                && (self.comparer)(
                    &self.current_key,
                    &self.sessions[self.next_session].lower_bound,
                )? != Ordering::Less
            {
                self.open_session(self.next_session);
                self.next_session += 1;
            }
            if self.next_session > first_unopened {
                break;
            }

            while let Some(top) = self.active.peek() {
                let session = &mut self.sessions[top];
                if (self.comparer)(session.current_key(), &self.current_key)? != Ordering::Equal {
                    break;
                }
                self.merger.add_partial_row(session.current_row())?;

                if session.advance() {
                    debug_assert!(
                        matches!(
                            (self.comparer)(&self.current_key, session.current_key()),
                            Ok(Ordering::Less)
                        ),
                        "store {} yielded keys out of order",
                        session.index
                    );
                    self.active.sift_down(|lhs, rhs| {
                        session_less(&self.sessions, &self.comparer, lhs, rhs)
                    })?;
                } else {
                    self.active.pop(|lhs, rhs| {
                        session_less(&self.sessions, &self.comparer, lhs, rhs)
                    })?;
                    self.awaiting.push(top);
                }
            }

            if let Some(row) = self.merger.build_merged_row()? {
                rows.push(row);
                self.row_count += 1;
            }
        }
        Ok(())
    }
}
