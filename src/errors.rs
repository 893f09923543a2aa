use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PegError
{
    DegenerateDomain,
    DimensionMismatch,
    InvalidTolerance,
    InvalidTimeStep,
    InvalidControlResolution,
    InvalidVelocity
}
impl std::error::Error for PegError {}

impl Display for PegError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}
