use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    It,
    En,
    Es,
}

/// Field labels used when rendering messages for one language.
#[derive(Debug)]
pub struct Labels {
    pub alert_title: &'static str,
    pub magnitude: &'static str,
    pub place: &'static str,
    pub time: &'static str,
    pub depth: &'static str,
    pub distance: &'static str,
    pub advice_title: &'static str,
    pub aftershock: &'static str,
    pub impact: &'static str,
    pub during: &'static str,
    pub after: &'static str,
    pub safety_tips: &'static str,
    pub push_permission_title: &'static str,
    pub push_permission_body: &'static str,
}

static ITALIAN: Labels = Labels {
    alert_title: "Allerta terremoto",
    magnitude: "Magnitudo",
    place: "Luogo",
    time: "Ora",
    depth: "Profondità",
    distance: "Distanza da te",
    advice_title: "Consigli",
    aftershock: "Repliche",
    impact: "Possibile impatto",
    during: "Durante il terremoto",
    after: "Dopo il terremoto",
    safety_tips: "Consigli di sicurezza",
    push_permission_title: "Notifiche disattivate",
    push_permission_body: "Consenti le notifiche del browser per ricevere gli avvisi di terremoto.",
};

static ENGLISH: Labels = Labels {
    alert_title: "Earthquake alert",
    magnitude: "Magnitude",
    place: "Place",
    time: "Time",
    depth: "Depth",
    distance: "Distance from you",
    advice_title: "Advice",
    aftershock: "Aftershocks",
    impact: "Possible impact",
    during: "During the earthquake",
    after: "After the earthquake",
    safety_tips: "Safety tips",
    push_permission_title: "Notifications disabled",
    push_permission_body: "Allow browser notifications to receive earthquake alerts.",
};

static SPANISH: Labels = Labels {
    alert_title: "Alerta de terremoto",
    magnitude: "Magnitud",
    place: "Lugar",
    time: "Hora",
    depth: "Profundidad",
    distance: "Distancia a ti",
    advice_title: "Consejos",
    aftershock: "Réplicas",
    impact: "Posible impacto",
    during: "Durante el terremoto",
    after: "Después del terremoto",
    safety_tips: "Consejos de seguridad",
    push_permission_title: "Notificaciones desactivadas",
    push_permission_body: "Permite las notificaciones del navegador para recibir alertas de terremotos.",
};

impl Language {
    pub fn labels(self) -> &'static Labels {
        match self {
            Language::It => &ITALIAN,
            Language::En => &ENGLISH,
            Language::Es => &SPANISH,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::It => "it",
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    #[test]
    fn language__should_default_to_italian() {
        assert_eq!(Language::default(), Language::It);
    }

    #[test]
    fn language__should_deserialize_from_code() {
        let language: Language = serde_json::from_str("\"es\"").expect("parse language");

        assert_eq!(language, Language::Es);
        assert_eq!(language.code(), "es");
        assert_eq!(language.labels().magnitude, "Magnitud");
    }
}
