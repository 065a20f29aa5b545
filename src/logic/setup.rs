//! Setup phase: start tournament (transition from Setup to InProgress).

use crate::logic::bracket::generate_bracket;
use crate::models::{Tournament, TournamentError, TournamentStatus};
use rand::Rng;

/// Start the tournament: require at least 2 entries, generate the bracket, set InProgress.
///
/// The tournament is left untouched when any check fails.
pub fn start_tournament<R: Rng + ?Sized>(
    tournament: &mut Tournament,
    rng: &mut R,
) -> Result<(), TournamentError> {
    if tournament.status != TournamentStatus::Setup {
        return Err(TournamentError::InvalidState);
    }
    let matches = generate_bracket(&tournament.players, rng)?;
    tournament.matches = matches;
    tournament.is_bracket_generated = true;
    tournament.status = TournamentStatus::InProgress;
    Ok(())
}
