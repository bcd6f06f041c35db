use std::task::{Context, Poll};

use futures_core::ready;
use futures_util::StreamExt;

use super::{StoreError, StoreStream};
use crate::{row::VersionedRow, value::UnversionedValue};

/// Completed fetch of a session, stashed until the reader consumes it.
pub(crate) enum Fetch<T> {
    Rows(Vec<T>),
    Exhausted,
    Failed(StoreError),
}

/// Per-store cursor state.
pub(crate) struct Session<'r, T> {
    pub(crate) index: usize,
    pub(crate) lower_bound: Vec<UnversionedValue>,
    stream: Option<StoreStream<'r, T>>,
    fetched: Option<Fetch<T>>,
    pub(crate) rows: Vec<T>,
    pub(crate) current: usize,
}

impl<'r, T> Session<'r, T> {
    pub(crate) fn new(index: usize, lower_bound: Vec<UnversionedValue>) -> Self {
        Self {
            index,
            lower_bound,
            stream: None,
            fetched: None,
            rows: Vec::new(),
            current: 0,
        }
    }

    pub(crate) fn open(&mut self, stream: StoreStream<'r, T>) {
        self.stream = Some(stream);
    }

    /// Drop the cursor and any buffered rows.
    pub(crate) fn close(&mut self) {
        self.stream = None;
        self.fetched = None;
        self.rows.clear();
        self.current = 0;
    }

    /// Install a fetched batch as the current rows.
    pub(crate) fn activate(&mut self, rows: Vec<T>) {
        self.rows = rows;
        self.current = 0;
    }

    /// Step past the current row; returns false once the batch is consumed.
    pub(crate) fn advance(&mut self) -> bool {
        self.current += 1;
        if self.current < self.rows.len() {
            return true;
        }
        self.rows.clear();
        self.current = 0;
        false
    }

    pub(crate) fn take_fetched(&mut self) -> Option<Fetch<T>> {
        self.fetched.take()
    }

    /// Poll the cursor for its next batch unless one is already stashed.
    pub(crate) fn poll_fetch(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if self.fetched.is_some() {
            return Poll::Ready(());
        }
        let fetch = match self.stream.as_mut() {
            None => Fetch::Exhausted,
            Some(stream) => match ready!(stream.poll_next_unpin(cx)) {
                Some(Ok(rows)) => Fetch::Rows(rows),
                Some(Err(error)) => Fetch::Failed(error),
                None => Fetch::Exhausted,
            },
        };
        self.fetched = Some(fetch);
        Poll::Ready(())
    }
}

impl Session<'_, VersionedRow> {
    pub(crate) fn current_row(&self) -> &VersionedRow {
        &self.rows[self.current]
    }

    pub(crate) fn current_key(&self) -> &[UnversionedValue] {
        self.current_row().keys()
    }
}

/// Poll every awaiting session; ready once any of them has a stashed fetch,
/// or immediately when nothing is awaited.
pub(crate) fn poll_any_ready<T>(
    sessions: &mut [Session<'_, T>],
    awaiting: &[usize],
    cx: &mut Context<'_>,
) -> Poll<()> {
    if awaiting.is_empty() {
        return Poll::Ready(());
    }
    let mut any_ready = false;
    for position in awaiting {
        if sessions[*position].poll_fetch(cx).is_ready() {
            any_ready = true;
        }
    }
    if any_ready {
        Poll::Ready(())
    } else {
        Poll::Pending
    }
}
