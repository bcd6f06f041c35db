use futures_util::future::poll_fn;

use super::{
    session::{poll_any_ready, Fetch, Session},
    ReaderError, StoreStream,
};
use crate::{logging::rowmerge_log, merger::RowMerger, option::ReaderOptions, row::VersionedRow};

/// Point lookups answered by several stores at once.
///
/// Every store answers the same sequence of looked-up keys, yielding one
/// entry per key in the same order (`None` where it holds no row). Entry `i`
/// of every store is merged into output row `i`; a key no store holds, or
/// whose merge is empty, stays in place as `None`.
pub struct OverlappingLookupReader<'r, M> {
    sessions: Vec<Session<'r, Option<VersionedRow>>>,
    merger: M,
    options: ReaderOptions,
    awaiting: Vec<usize>,
    exhausted: bool,
    row_count: usize,
}

impl<'r, M> OverlappingLookupReader<'r, M>
where
    M: RowMerger<Input = VersionedRow>,
{
    /// Reader over `stores`; every cursor is opened immediately.
    pub fn new<I>(stores: I, merger: M, options: ReaderOptions) -> Self
    where
        I: IntoIterator<Item = StoreStream<'r, Option<VersionedRow>>>,
    {
        let sessions: Vec<_> = stores
            .into_iter()
            .enumerate()
            .map(|(index, stream)| {
                let mut session = Session::new(index, Vec::new());
                session.open(stream);
                session
            })
            .collect();
        let awaiting = (0..sessions.len()).collect();
        Self {
            exhausted: sessions.is_empty(),
            sessions,
            merger,
            options,
            awaiting,
            row_count: 0,
        }
    }

    /// Resolves once a pending store fetch has completed, or immediately when
    /// no fetch is pending.
    pub async fn ready(&mut self) {
        poll_fn(|cx| poll_any_ready(&mut self.sessions, &self.awaiting, cx)).await
    }

    /// Fill `rows` with the next merged lookups, at most
    /// [`ReaderOptions::batch_size`] of them. Returns `false` once the stores
    /// are exhausted.
    pub async fn read(&mut self, rows: &mut Vec<Option<M::Output>>) -> Result<bool, ReaderError> {
        rows.clear();
        self.merger.reset();

        loop {
            self.ready().await;
            self.refill()?;

            if self.exhausted {
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

    /// Read every remaining lookup.
    pub async fn read_all(&mut self) -> Result<Vec<Option<M::Output>>, ReaderError> {
        let mut all = Vec::new();
        let mut rows = Vec::with_capacity(self.options.batch_size);
        while self.read(&mut rows).await? {
            all.append(&mut rows);
        }
        Ok(all)
    }

    /// Lookups answered so far, absent rows included.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Whether the stores have run out of rows.
    pub fn is_fetching_completed(&self) -> bool {
        self.exhausted
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
                    session.activate(rows);
                    self.awaiting.remove(cursor);
                }
                Some(Fetch::Exhausted) => {
                    rowmerge_log!(
                        log::Level::Trace,
                        "session_exhausted",
                        "store={}",
                        session.index
                    );
                    debug_assert!(
                        self.sessions.iter().all(|session| session.rows.is_empty()),
                        "lookup stores yielded different row counts"
                    );
                    self.sessions.iter_mut().for_each(Session::close);
                    self.awaiting.clear();
                    self.exhausted = true;
                    return Ok(());
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
        Ok(())
    }

    fn drain(&mut self, rows: &mut Vec<Option<M::Output>>) -> Result<(), ReaderError> {
        while self.awaiting.is_empty() && rows.len() < self.options.batch_size {
            for (position, session) in self.sessions.iter_mut().enumerate() {
                if let Some(row) = &session.rows[session.current] {
                    self.merger.add_partial_row(row)?;
                }
                if !session.advance() {
                    self.awaiting.push(position);
                }
            }
            rows.push(self.merger.build_merged_row()?);
            self.row_count += 1;
        }
        Ok(())
    }
}
