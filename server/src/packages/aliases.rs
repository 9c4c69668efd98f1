//! Well-known products whose identifiers don't resemble their names.
//!
//! Matched by substring containment against the lowercased identifier;
//! the first entry in table order wins, so more specific keys come first.

const KNOWN_ALIASES: &[(&str, &str)] = &[
    ("facebook.orca", "Messenger"),
    ("facebook.katana", "Facebook"),
    ("facebook.lite", "Facebook Lite"),
    ("whatsapp.w4b", "WhatsApp Business"),
    ("whatsapp", "WhatsApp"),
    ("instagram", "Instagram"),
    ("zhiliaoapp.musically", "TikTok"),
    ("ss.android.ugc.trill", "TikTok"),
    ("twitter.android", "X"),
    ("telegram", "Telegram"),
    ("thoughtcrime.securesms", "Signal"),
    ("snapchat", "Snapchat"),
    ("spotify", "Spotify"),
    ("netflix", "Netflix"),
    ("android.youtube", "YouTube"),
    ("youtube.music", "YouTube Music"),
    ("android.apps.maps", "Google Maps"),
    ("android.apps.photos", "Google Photos"),
    ("android.apps.docs", "Google Drive"),
    ("android.apps.messaging", "Messages"),
    ("android.apps.nexuslauncher", "Pixel Launcher"),
    ("googlequicksearchbox", "Google"),
    ("android.gms", "Google Play services"),
    ("android.gm", "Gmail"),
    ("android.vending", "Google Play Store"),
    ("android.chrome", "Chrome"),
    ("android.dialer", "Phone"),
    ("android.contacts", "Contacts"),
    ("android.calendar", "Calendar"),
    ("android.deskclock", "Clock"),
    ("android.camera", "Camera"),
    ("android.calculator", "Calculator"),
    ("android.documentsui", "Files"),
    ("android.settings", "Settings"),
    ("android.systemui", "System UI"),
    ("microsoft.teams", "Microsoft Teams"),
    ("microsoft.office.outlook", "Outlook"),
    ("skype", "Skype"),
    ("amazon.mshop", "Amazon Shopping"),
    ("ubercab", "Uber"),
    ("zoom.videomeetings", "Zoom"),
];

/// Canonical display name for a well-known identifier, if any.
pub fn lookup(package_id: &str) -> Option<&'static str> {
    let lower = package_id.to_lowercase();
    KNOWN_ALIASES
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_exact_product() {
        assert_eq!(lookup("com.whatsapp"), Some("WhatsApp"));
        assert_eq!(lookup("com.google.android.gm"), Some("Gmail"));
        assert_eq!(lookup("com.zhiliaoapp.musically"), Some("TikTok"));
    }

    #[test]
    fn test_alias_table_order_wins() {
        // Both "whatsapp.w4b" and "whatsapp" match; the earlier entry wins.
        assert_eq!(lookup("com.whatsapp.w4b"), Some("WhatsApp Business"));
        assert_eq!(lookup("com.facebook.orca"), Some("Messenger"));
        assert_eq!(lookup("com.google.android.gms"), Some("Google Play services"));
    }

    #[test]
    fn test_alias_case_insensitive() {
        assert_eq!(lookup("COM.Spotify.Music"), Some("Spotify"));
    }

    #[test]
    fn test_alias_no_match() {
        assert_eq!(lookup("org.example.notes"), None);
    }
}
