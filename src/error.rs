use thiserror::Error;

/// A reason a route was rejected while being assembled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("section {section} has no aspects")]
    EmptyAspectTable { section: usize },
    #[error("section {section} links to section {link}, which does not exist")]
    SectionLinkOutOfRange { section: usize, link: usize },
    #[error("section {section} refers to station {station}, which does not exist")]
    SectionStationOutOfRange { section: usize, station: usize },
    #[error("track element {element} refers to station {station}, which does not exist")]
    EventStationOutOfRange { element: usize, station: usize },
    #[error("track element {element} refers to section {section}, which does not exist")]
    EventSectionOutOfRange { element: usize, section: usize },
    #[error("track element {element} is positioned before its predecessor")]
    UnorderedTrack { element: usize },
    #[error("precursor instructions must be in ascending time order")]
    UnorderedInstructions,
}
