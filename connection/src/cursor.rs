//! Streaming result consumption: reads one frame at a time instead of buffering the whole
//! result set. Grounded directly on the teacher's `StreamQueryResult`
//! (`connection/src/conn/query_result.rs`) — same `Iterator` + drain-on-`Drop` shape,
//! generalized from its EOF-packet sentinel to this protocol's `FetchDone` frame.

use std::io::{Read, Write};

use chrono_tz::Tz;
use common::err::XResult;

use crate::codec::read_frame;
use crate::result::{dispatch_frame, ColumnMetaData, Row, StatementResult};

/// Yields rows one at a time as they arrive on the wire. Dropping a `Cursor` before it's
/// exhausted drains the remaining rows so the underlying `Session` is never left mid-result.
pub struct Cursor<'a, T: Read + Write> {
    transport: &'a mut T,
    tz: Tz,
    columns: Vec<ColumnMetaData>,
    done: bool,
    partial: StatementResult,
}

impl<'a, T: Read + Write> Cursor<'a, T> {
    /// Reads the column-metadata header off `transport`, then returns a cursor positioned
    /// to yield rows.
    pub(crate) fn open(transport: &'a mut T, tz: Tz) -> XResult<Self> {
        let mut partial = StatementResult::default();
        // Column-metadata frames accumulate silently; the header phase ends the moment
        // something else shows up (a row, or an empty result set's terminator).
        loop {
            let frame = read_frame(transport)?;
            dispatch_frame(&frame, &mut partial, tz)?;
            if partial.fetch_done || partial.stmt_ok || !partial.rows.is_empty() {
                break;
            }
        }
        let columns = std::mem::take(&mut partial.columns);
        let done = partial.fetch_done || partial.stmt_ok;
        Ok(Cursor { transport, tz, columns, done, partial })
    }

    pub fn columns(&self) -> &[ColumnMetaData] {
        &self.columns
    }
}

impl<T: Read + Write> Iterator for Cursor<'_, T> {
    type Item = XResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(row) = self.partial.rows.pop() {
            return Some(Ok(row));
        }

        loop {
            let frame = match read_frame(self.transport) {
                Ok(frame) => frame,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            if let Err(err) = dispatch_frame(&frame, &mut self.partial, self.tz) {
                self.done = true;
                return Some(Err(err));
            }
            if let Some(row) = self.partial.rows.pop() {
                return Some(Ok(row));
            }
            if self.partial.fetch_done || self.partial.stmt_ok {
                self.done = true;
                return None;
            }
        }
    }
}

impl<T: Read + Write> Drop for Cursor<'_, T> {
    fn drop(&mut self) {
        while self.next().is_some() {}
    }
}
