pub mod utils;

#[cfg(test)]
mod test_projection_flow;
#[cfg(test)]
mod test_reconciliation;
