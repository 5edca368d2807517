//! The fixed catalogue of guest intentions the classifier chooses from.

/// Number of intentions in the catalogue. Labels are `1..=INTENTION_COUNT`.
pub const INTENTION_COUNT: u8 = 40;

const INTENTION_NAMES: [&str; INTENTION_COUNT as usize] = [
    "Check room availability",
    "Make a reservation / Book a room",
    "Modify reservation",
    "Cancel reservation",
    "Check reservation status",
    "Request early check-in",
    "Request late check-out",
    "Check-in online",
    "Check-out online",
    "Request luggage assistance",
    "Order room service",
    "Book a table at a restaurant",
    "Request menu or dietary information",
    "Ask for breakfast hours or availability",
    "Request minibar refill",
    "Request room cleaning",
    "Request extra towels, toiletries, or pillows",
    "Report an issue in the room",
    "Request laundry service",
    "Request in-room amenities (e.g., iron, hair dryer)",
    "Ask about local attractions or tours",
    "Request a wake-up call",
    "Ask for taxi or shuttle service",
    "Ask about hotel policies",
    "Request spa or gym appointment",
    "Ask for invoice or receipt",
    "Query charges on the bill",
    "Change payment method",
    "Split bill",
    "Pre-authorize payment or deposit",
    "Ask for Wi-Fi access or help",
    "Ask about facility opening hours",
    "Request parking information",
    "Ask about pet policy",
    "Ask about smoking policy",
    "Leave a review or feedback",
    "Report a complaint",
    "Ask to speak to a manager",
    "Request human support or live agent",
    "Ask for help using the chatbot",
];

pub fn is_valid_intention(id: u8) -> bool {
    (1..=INTENTION_COUNT).contains(&id)
}

/// Human-readable name for an intention id, `None` outside `1..=40`.
pub fn intention_name(id: u8) -> Option<&'static str> {
    if !is_valid_intention(id) {
        return None;
    }
    INTENTION_NAMES.get(usize::from(id) - 1).copied()
}

/// `"16 - Request room cleaning"`, or the bare number for unknown ids.
pub fn describe_intention(id: u8) -> String {
    match intention_name(id) {
        Some(name) => format!("{id} - {name}"),
        None => id.to_string(),
    }
}

/// Numbered catalogue, one intention per line, as embedded in prompts.
pub fn intention_list() -> String {
    INTENTION_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {}", i + 1, name))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_cover_full_range() {
        for id in 1..=INTENTION_COUNT {
            assert!(intention_name(id).is_some(), "missing name for {id}");
        }
        assert_eq!(intention_name(0), None);
        assert_eq!(intention_name(41), None);
    }

    #[test]
    fn test_known_names() {
        assert_eq!(intention_name(16), Some("Request room cleaning"));
        assert_eq!(intention_name(40), Some("Ask for help using the chatbot"));
    }

    #[test]
    fn test_describe_intention() {
        assert_eq!(describe_intention(7), "7 - Request late check-out");
        assert_eq!(describe_intention(99), "99");
    }

    #[test]
    fn test_intention_list_is_numbered() {
        let list = intention_list();
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 40);
        assert_eq!(lines[0], "1. Check room availability");
        assert_eq!(lines[39], "40. Ask for help using the chatbot");
    }
}
