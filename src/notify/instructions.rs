//! Care instructions sent before and after each therapy.

const VAMANA_PRE: [&str; 5] = [
    "Avoid heavy meals 24 hours before therapy",
    "Drink plenty of warm water",
    "Follow prescribed diet (light, easily digestible food)",
    "Avoid cold drinks and ice cream",
    "Get adequate rest the night before",
];

const VAMANA_POST: [&str; 5] = [
    "Follow a light, warm diet for 3-5 days",
    "Avoid cold foods and drinks",
    "Rest adequately",
    "Take prescribed medications",
    "Avoid physical exertion",
];

/// Pre-therapy instructions. Unknown therapies get the Vamana list.
pub fn pre_therapy(therapy_key: &str) -> &'static [&'static str] {
    match therapy_key {
        "virechana" => &[
            "Follow a light diet for 2-3 days before therapy",
            "Avoid oily and spicy foods",
            "Drink warm water throughout the day",
            "Avoid alcohol and smoking",
            "Take prescribed medications as directed",
        ],
        "basti" => &[
            "Empty your bowels before the therapy",
            "Follow a light diet",
            "Avoid cold foods and drinks",
            "Stay hydrated with warm water",
            "Inform practitioner of any discomfort",
        ],
        "nasya" => &[
            "Clean your nostrils before therapy",
            "Avoid cold and windy environments",
            "Follow prescribed diet",
            "Avoid smoking and alcohol",
            "Get adequate rest",
        ],
        "raktamokshana" => &[
            "Avoid heavy physical activities",
            "Follow prescribed diet",
            "Inform about any blood-related conditions",
            "Avoid alcohol and smoking",
            "Get adequate rest",
        ],
        _ => &VAMANA_PRE,
    }
}

/// Post-therapy instructions. Unknown therapies get the Vamana list.
pub fn post_therapy(therapy_key: &str) -> &'static [&'static str] {
    match therapy_key {
        "virechana" => &[
            "Follow prescribed post-therapy diet",
            "Stay hydrated with warm water",
            "Avoid oily and spicy foods",
            "Rest and avoid physical strain",
            "Take prescribed medications",
        ],
        "basti" => &[
            "Rest for 30-60 minutes after therapy",
            "Follow prescribed diet",
            "Avoid cold foods and drinks",
            "Take prescribed medications",
            "Avoid heavy physical activities",
        ],
        "nasya" => &[
            "Avoid cold and windy environments",
            "Follow prescribed diet",
            "Avoid smoking and alcohol",
            "Rest adequately",
            "Take prescribed medications",
        ],
        "raktamokshana" => &[
            "Keep the treated area clean and dry",
            "Follow prescribed diet",
            "Avoid heavy physical activities",
            "Take prescribed medications",
            "Monitor for any unusual symptoms",
        ],
        _ => &VAMANA_POST,
    }
}
