//! Content fingerprints of ingested document ids
//!
//! A document id is bound to the content it was first ingested with. Re-ingesting
//! identical content is idempotent; different content under the same id is refused.

use dealflow_common::errors::AppError;
use dealflow_common::models::Document;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

type Fingerprint = [u8; 32];

fn fingerprint(document: &Document) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(document.company_id.as_bytes());
    hasher.update(document.text.as_bytes());
    hasher.finalize().into()
}

struct Binding {
    fingerprint: Fingerprint,
    in_flight: usize,
    indexed: bool,
}

#[derive(Default)]
pub(crate) struct DocumentLedger {
    bindings: Mutex<HashMap<Uuid, Binding>>,
}

impl DocumentLedger {
    /// Bind `document.id` to its content for the lifetime of the returned claim
    pub(crate) fn claim(&self, document: &Document) -> Result<Claim<'_>, AppError> {
        let fingerprint = fingerprint(document);
        let mut bindings = self.bindings.lock();
        match bindings.get_mut(&document.id) {
            Some(binding) if binding.fingerprint != fingerprint => {
                return Err(AppError::DocumentConflict {
                    id: document.id.to_string(),
                });
            }
            Some(binding) => binding.in_flight += 1,
            None => {
                bindings.insert(
                    document.id,
                    Binding {
                        fingerprint,
                        in_flight: 1,
                        indexed: false,
                    },
                );
            }
        }
        Ok(Claim {
            ledger: self,
            document_id: document.id,
            fingerprint,
            indexed: false,
        })
    }

    /// Release a document id once its chunks are gone
    pub(crate) fn forget(&self, document_id: &Uuid) {
        self.bindings.lock().remove(document_id);
    }

    #[cfg(test)]
    pub(crate) fn is_bound(&self, document_id: &Uuid) -> bool {
        self.bindings.lock().contains_key(document_id)
    }

    fn settle(&self, document_id: Uuid, fingerprint: Fingerprint, indexed: bool) {
        let mut bindings = self.bindings.lock();
        match bindings.get_mut(&document_id) {
            Some(binding) => {
                binding.in_flight = binding.in_flight.saturating_sub(1);
                binding.indexed |= indexed && binding.fingerprint == fingerprint;
                if binding.in_flight == 0 && !binding.indexed {
                    bindings.remove(&document_id);
                }
            }
            // Deleted while in flight; the chunks just written still need an owner
            None if indexed => {
                bindings.insert(
                    document_id,
                    Binding {
                        fingerprint,
                        in_flight: 0,
                        indexed: true,
                    },
                );
            }
            None => {}
        }
    }
}

/// Held while a document is being ingested. Dropping it without
/// [`Claim::indexed`] releases an id that never reached the index.
pub(crate) struct Claim<'a> {
    ledger: &'a DocumentLedger,
    document_id: Uuid,
    fingerprint: Fingerprint,
    indexed: bool,
}

impl Claim<'_> {
    pub(crate) fn indexed(mut self) {
        self.indexed = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.ledger
            .settle(self.document_id, self.fingerprint, self.indexed);
    }
}
