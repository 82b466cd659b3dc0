use tonic::Status;

use crate::auth::AuthError;
use crate::booking::BookingError;
use crate::regulations::RegulationError;
use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Booking(#[from] BookingError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Regulation(#[from] RegulationError),
    #[error("month {0:?} is not in YYYY-MM form")]
    InvalidMonth(String),
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),
}

impl From<ServerError> for Status {
    fn from(error: ServerError) -> Self {
        let message = error.to_string();
        match error {
            ServerError::Validation(ValidationError::IncompleteFlight)
            | ServerError::Validation(ValidationError::IncompleteStop)
            | ServerError::Validation(ValidationError::UnknownAirline(_))
            | ServerError::Validation(ValidationError::UnknownAirport(_))
            | ServerError::Booking(BookingError::NoPassengers)
            | ServerError::Booking(BookingError::IncompletePassenger(_))
            | ServerError::Booking(BookingError::UnknownRank(_))
            | ServerError::Regulation(RegulationError::Incomplete)
            | ServerError::Auth(AuthError::Incomplete)
            | ServerError::Auth(AuthError::PasswordMismatch)
            | ServerError::InvalidMonth(_)
            | ServerError::MalformedRequest(_) => Status::invalid_argument(message),
            ServerError::Validation(_) | ServerError::Booking(_) => {
                Status::failed_precondition(message)
            }
            ServerError::Regulation(RegulationError::DuplicateName(_))
            | ServerError::Auth(AuthError::UsernameTaken(_)) => Status::already_exists(message),
            ServerError::Regulation(RegulationError::Unknown(_)) => Status::not_found(message),
            ServerError::Auth(AuthError::PermissionDenied(_)) => {
                Status::permission_denied(message)
            }
            ServerError::Auth(_) => Status::unauthenticated(message),
            ServerError::Store(StoreError::Parse(_)) => Status::internal(message),
            ServerError::Store(_) => Status::not_found(message),
        }
    }
}

#[cfg(test)]
mod test {
    use schema::{FlightId, UserRole};
    use tonic::Code;

    use super::*;

    #[test]
    fn test_status_codes() {
        let status = |e: ServerError| Status::from(e).code();

        assert_eq!(
            status(ValidationError::DuplicateFlightId(FlightId::from_str("CB1")).into()),
            Code::FailedPrecondition
        );
        assert_eq!(status(ValidationError::IncompleteStop.into()), Code::InvalidArgument);
        assert_eq!(
            status(StoreError::UnknownFlight(FlightId::from_str("CB9")).into()),
            Code::NotFound
        );
        assert_eq!(status(AuthError::Unauthenticated.into()), Code::Unauthenticated);
        assert_eq!(
            status(AuthError::PermissionDenied(UserRole::User).into()),
            Code::PermissionDenied
        );
        assert_eq!(
            status(ServerError::InvalidMonth("13".to_string())),
            Code::InvalidArgument
        );
    }
}
