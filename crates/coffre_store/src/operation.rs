//! Operation context and the transaction runner.

use crate::error::{ErrorClass, StoreError};
use crate::provider::{Provider, WriteBatch, WriteMode};
use coffre_schema::{Collection, Document};

/// Correlates one business transaction: accumulated read/write counts for
/// quota accounting and the three staging lists flushed atomically at the
/// end.
#[derive(Debug)]
pub struct OperationContext {
    org: String,
    reads: u64,
    write_units: u64,
    inserts: Vec<Document>,
    updates: Vec<Document>,
    deletes: Vec<(Collection, String, Option<String>)>,
}

impl OperationContext {
    /// Creates a context for one tenant operation.
    #[must_use]
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            reads: 0,
            write_units: 0,
            inserts: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }

    /// The tenant this operation runs for.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Accumulated read count.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Accumulated write units (flushed rows and deletions).
    #[must_use]
    pub fn write_units(&self) -> u64 {
        self.write_units
    }

    /// Records one backend read for quota accounting.
    pub fn note_read(&mut self) {
        self.reads += 1;
    }

    /// Stages a document for insertion.
    pub fn stage_insert(&mut self, doc: Document) {
        self.inserts.push(doc);
    }

    /// Stages a document for update.
    pub fn stage_update(&mut self, doc: Document) {
        self.updates.push(doc);
    }

    /// Stages a deletion by plaintext ids.
    pub fn stage_delete(&mut self, collection: Collection, id: &str, sub_id: Option<&str>) {
        self.deletes
            .push((collection, id.to_owned(), sub_id.map(str::to_owned)));
    }

    /// Whether anything is staged.
    #[must_use]
    pub fn has_staged_writes(&self) -> bool {
        !self.inserts.is_empty() || !self.updates.is_empty() || !self.deletes.is_empty()
    }

    /// Encrypts the staging lists into a physical batch and clears them.
    fn drain_into_batch(&mut self, provider: &dyn Provider) -> Result<WriteBatch, StoreError> {
        let codec = provider.codec();
        let mut batch = WriteBatch::default();
        for doc in self.inserts.drain(..) {
            batch.inserts.push(codec.prepare_row(&doc)?);
        }
        for doc in self.updates.drain(..) {
            batch.updates.push(codec.prepare_row(&doc)?);
        }
        for (collection, id, sub_id) in self.deletes.drain(..) {
            let long = codec.long_id(&id)?;
            let sub = match sub_id {
                Some(s) => Some(codec.crypt_id(&s)?),
                None => None,
            };
            batch.deletes.push(coffre_schema::RowKey {
                collection,
                id: long,
                sub_id: sub,
            });
        }
        self.write_units += batch.len() as u64;
        Ok(batch)
    }
}

/// Failure inside a transaction callback.
///
/// Storage errors are classified by the runner; application errors pass
/// through it unchanged, bypassing classification entirely.
#[derive(Debug)]
pub enum OpError<E> {
    /// A provider or codec failure.
    Store(StoreError),
    /// An error raised by the business callback itself.
    App(E),
}

impl<E> From<StoreError> for OpError<E> {
    fn from(e: StoreError) -> Self {
        OpError::Store(e)
    }
}

impl<E> From<coffre_codec::CodecError> for OpError<E> {
    fn from(e: coffre_codec::CodecError) -> Self {
        OpError::Store(StoreError::Codec(e))
    }
}

/// Tri-state result of one transaction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// All staged writes are durable.
    Committed,
    /// The backend reported a lock or serialization conflict; the caller
    /// may re-run the whole transaction.
    Retryable(String),
    /// The transaction failed and must not be retried.
    Fatal(String),
}

impl Outcome {
    /// Whether the transaction committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }

    /// Failure detail, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::Committed => None,
            Outcome::Retryable(d) | Outcome::Fatal(d) => Some(d),
        }
    }
}

fn classify(e: StoreError) -> Outcome {
    match e.class() {
        ErrorClass::Retryable => Outcome::Retryable(e.to_string()),
        ErrorClass::Fatal => Outcome::Fatal(e.to_string()),
    }
}

/// Runs one business transaction against a provider.
///
/// Protocol: begin, invoke the callback (reads go through the query
/// surface, writes are staged on the context), flush staged inserts then
/// updates then deletes, commit. On any storage failure the transaction
/// is rolled back (rollback failures are swallowed) and the error is
/// classified into the returned [`Outcome`]. An application error from
/// the callback rolls back and propagates unchanged as `Err`.
///
/// The runner never loop-retries; backoff and retry count are the
/// caller's decision.
pub fn run_operation<E, F>(
    provider: &dyn Provider,
    ctx: &mut OperationContext,
    body: F,
) -> Result<Outcome, E>
where
    F: FnOnce(&mut OperationContext, &dyn Provider) -> Result<(), OpError<E>>,
{
    if let Err(e) = provider.begin() {
        return Ok(classify(e));
    }
    tracing::debug!(org = ctx.org(), "transaction open");

    match body(ctx, provider) {
        Err(OpError::App(e)) => {
            let _ = provider.rollback();
            Err(e)
        }
        Err(OpError::Store(e)) => {
            let _ = provider.rollback();
            tracing::warn!(org = ctx.org(), error = %e, "transaction rolled back");
            Ok(classify(e))
        }
        Ok(()) => {
            let flushed = ctx
                .drain_into_batch(provider)
                .and_then(|batch| provider.bulk_mutate(&batch, WriteMode::Transactional))
                .and_then(|()| provider.commit());
            match flushed {
                Ok(()) => {
                    tracing::debug!(
                        org = ctx.org(),
                        reads = ctx.reads(),
                        writes = ctx.write_units(),
                        "transaction committed"
                    );
                    Ok(Outcome::Committed)
                }
                Err(e) => {
                    let _ = provider.rollback();
                    tracing::warn!(org = ctx.org(), error = %e, "commit failed, rolled back");
                    Ok(classify(e))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_accumulates_counts() {
        let mut ctx = OperationContext::new("815");
        assert_eq!(ctx.org(), "815");
        ctx.note_read();
        ctx.note_read();
        assert_eq!(ctx.reads(), 2);
        assert_eq!(ctx.write_units(), 0);
        assert!(!ctx.has_staged_writes());
    }

    #[test]
    fn staging_is_visible() {
        let mut ctx = OperationContext::new("815");
        ctx.stage_delete(Collection::Notes, "G1", Some("n1"));
        assert!(ctx.has_staged_writes());
    }

    #[test]
    fn outcome_accessors() {
        assert!(Outcome::Committed.is_committed());
        assert_eq!(Outcome::Committed.detail(), None);
        assert_eq!(Outcome::Retryable("busy".into()).detail(), Some("busy"));
        assert!(!Outcome::Fatal("broken".into()).is_committed());
    }
}
