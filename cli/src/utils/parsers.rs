use election_core::state::Address;

pub fn parse_address(s: &str) -> Result<Address, String> {
    s.parse().map_err(|e| format!("{e}"))
}

pub fn parse_view(s: &str) -> Result<View, String> {
    match s.to_lowercase().as_str() {
        "candidates" => Ok(View::Candidates),
        "ranking" => Ok(View::Ranking),
        "winner" => Ok(View::Winner),
        "warnings" => Ok(View::Warnings),
        _ => Err(format!("invalid view: {}", s)),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Candidates,
    Ranking,
    Winner,
    Warnings,
}
