use dinely_core::domain::request::{SuggestionRequest, TIME_FORMAT};
use dinely_core::domain::restaurant::RestaurantDetail;

pub fn subject(request: &SuggestionRequest) -> String {
    format!("Your {} restaurant suggestions in {}", request.category, request.area)
}

/// Renders the outgoing message body: the request criteria, then the enriched
/// suggestions enumerated in resolver order with their address lines joined.
pub fn body(request: &SuggestionRequest, suggestions: &[RestaurantDetail]) -> String {
    if suggestions.is_empty() {
        return format!(
            "Hello! I could not find any {} restaurant suggestions in {} right now. \
             Please try another cuisine.",
            request.category, request.area
        );
    }

    let mut message = format!(
        "Hello! Here are my {} restaurant suggestions in {} for {} people, on {} at {}:",
        request.category,
        request.area,
        request.party_size,
        request.date.format("%Y-%m-%d"),
        request.time.format(TIME_FORMAT),
    );

    for (position, suggestion) in suggestions.iter().enumerate() {
        message.push('\n');
        message.push_str(&format!(
            "{}. {}, {}",
            position + 1,
            suggestion.name,
            suggestion.location.join(", ")
        ));
    }
    message.push_str("\nEnjoy your meal!");

    message
}
