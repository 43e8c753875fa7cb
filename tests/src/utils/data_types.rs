use std::sync::Arc;

use election_core::memory::MemoryLedger;
use election_core::state::Address;

pub struct LedgerTestContext {
    pub ledger: Arc<MemoryLedger>,
    pub admin: Address,
    pub voters: Vec<Address>,
}

impl LedgerTestContext {
    pub fn voter(&self, n: usize) -> &Address {
        &self.voters[n]
    }
}
