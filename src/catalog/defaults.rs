//! Built-in reference data.

use crate::types::{ClinicData, PractitionerData, TherapyTypeData};

/// A therapy known to the pricing table and the reporting charts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KnownTherapy {
    pub key: &'static str,
    pub label: &'static str,
    pub base_price: u64,
}

/// The five Panchakarma therapies, in chart order.
pub const KNOWN_THERAPIES: [KnownTherapy; 5] = [
    KnownTherapy {
        key: "vamana",
        label: "Vamana (Therapeutic Vomiting)",
        base_price: 2500,
    },
    KnownTherapy {
        key: "virechana",
        label: "Virechana (Purgation Therapy)",
        base_price: 2000,
    },
    KnownTherapy {
        key: "basti",
        label: "Basti (Medicated Enema)",
        base_price: 3000,
    },
    KnownTherapy {
        key: "nasya",
        label: "Nasya (Nasal Administration)",
        base_price: 1500,
    },
    KnownTherapy {
        key: "raktamokshana",
        label: "Raktamokshana (Bloodletting)",
        base_price: 4000,
    },
];

pub fn known_therapy(key: &str) -> Option<&'static KnownTherapy> {
    KNOWN_THERAPIES.iter().find(|t| t.key == key)
}

/// Display label for a therapy key; unknown keys are shown as-is.
pub fn therapy_label(key: &str) -> String {
    known_therapy(key)
        .map(|t| t.label.to_string())
        .unwrap_or_else(|| key.to_string())
}

pub fn default_therapy_types() -> Vec<TherapyTypeData> {
    let entry = |key: &str, name: &str, description: &str, price: u64, minutes: u32, pre: &str, post: &str| {
        TherapyTypeData {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            base_price: price,
            duration_minutes: minutes,
            pre_instructions: pre.to_string(),
            post_instructions: post.to_string(),
        }
    };

    vec![
        entry(
            "vamana",
            "Vamana Therapy",
            "Therapeutic vomiting to eliminate Kapha dosha and toxins from the upper body",
            2500,
            90,
            "Avoid heavy meals 24 hours before therapy. Drink plenty of warm water. Follow prescribed diet.",
            "Follow a light, warm diet for 3-5 days. Avoid cold foods and drinks. Rest adequately.",
        ),
        entry(
            "virechana",
            "Virechana Therapy",
            "Purgation therapy to cleanse the digestive system and eliminate Pitta dosha",
            2000,
            60,
            "Follow a light diet for 2-3 days before therapy. Avoid oily and spicy foods.",
            "Follow the prescribed post-therapy diet. Stay hydrated with warm water.",
        ),
        entry(
            "basti",
            "Basti Therapy",
            "Medicated enema therapy to balance Vata dosha and strengthen the colon",
            3000,
            120,
            "Empty bowels before therapy. Follow prescribed diet. Avoid cold foods and drinks.",
            "Rest for 30-60 minutes after therapy. Avoid heavy physical activities.",
        ),
        entry(
            "nasya",
            "Nasya Therapy",
            "Nasal administration of medicated oils to treat head and neck disorders",
            1500,
            45,
            "Clean nostrils before therapy. Avoid cold and windy environments.",
            "Avoid cold and windy environments. Avoid smoking and alcohol.",
        ),
        entry(
            "raktamokshana",
            "Raktamokshana Therapy",
            "Bloodletting therapy to purify blood and treat skin disorders",
            4000,
            90,
            "Avoid heavy physical activities. Inform about any blood-related conditions.",
            "Keep the treated area clean and dry. Monitor for any unusual symptoms.",
        ),
    ]
}

pub fn default_clinics() -> Vec<ClinicData> {
    vec![
        ClinicData {
            name: "AyurSutra Wellness Center".into(),
            location: "MG Road, Kochi, Kerala".into(),
            contact: Some("+91 98470 12345".into()),
            timings: Some("06:00 - 20:00".into()),
        },
        ClinicData {
            name: "AyurSutra Panchakarma Clinic".into(),
            location: "Jayanagar, Bengaluru, Karnataka".into(),
            contact: Some("+91 98450 67890".into()),
            timings: Some("07:00 - 19:00".into()),
        },
    ]
}

/// Default practitioners. `clinic_index` points into [`default_clinics`].
pub fn default_practitioners() -> Vec<(PractitionerData, usize)> {
    vec![
        (
            PractitionerData {
                name: "Dr. Meera Nair".into(),
                specialization: "Panchakarma Specialist".into(),
                contact: Some("meera.nair@gmail.com".into()),
                clinic_id: None,
            },
            0,
        ),
        (
            PractitionerData {
                name: "Dr. Arjun Rao".into(),
                specialization: "Kayachikitsa (Internal Medicine)".into(),
                contact: Some("arjun.rao@gmail.com".into()),
                clinic_id: None,
            },
            1,
        ),
    ]
}
