use http::{HeaderMap, header::ACCEPT_LANGUAGE};
use strum::{Display, EnumString, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Locale {
    #[default]
    En,
    De,
    Es,
    Fr,
    It,
    Nl,
    Pt,
}

impl Locale {
    pub const fn title(self) -> &'static str {
        match self {
            Self::En => "Access denied",
            Self::De => "Zugriff verweigert",
            Self::Es => "Acceso denegado",
            Self::Fr => "Accès refusé",
            Self::It => "Accesso negato",
            Self::Nl => "Toegang geweigerd",
            Self::Pt => "Acesso negado",
        }
    }

    pub const fn blocked_message(self) -> &'static str {
        match self {
            Self::En => "Sorry, this site is not available in your region.",
            Self::De => "Diese Seite ist in deiner Region leider nicht verfügbar.",
            Self::Es => "Lo sentimos, este sitio no está disponible en tu región.",
            Self::Fr => "Désolé, ce site n'est pas disponible dans votre région.",
            Self::It => "Spiacenti, questo sito non è disponibile nella tua regione.",
            Self::Nl => "Sorry, deze site is niet beschikbaar in jouw regio.",
            Self::Pt => "Desculpe, este site não está disponível na sua região.",
        }
    }
}

/// Picks the best supported locale from `Accept-Language`.
/// Region subtags are ignored, `pt-BR` gives `pt`.
pub fn negotiate(headers: &HeaderMap, default: Locale) -> Locale {
    let mut best: Option<(Locale, f32)> = None;

    for (tag, q) in headers
        .get_all(ACCEPT_LANGUAGE)
        .iter()
        .filter_map(|x| x.to_str().ok())
        .flat_map(|x| x.split(','))
        .filter_map(parse_language)
    {
        let Some(lang) = tag.split(['-', '_']).next() else {
            continue;
        };

        let Ok(locale) = lang.parse::<Locale>() else {
            continue;
        };

        // Earlier entries win on equal weight
        if q > 0.0 && best.is_none_or(|(_, b)| q > b) {
            best = Some((locale, q));
        }
    }

    best.map_or(default, |(x, _)| x)
}

fn parse_language(item: &str) -> Option<(&str, f32)> {
    let mut parts = item.split(';').map(str::trim);
    let tag = parts.next().filter(|x| !x.is_empty())?;

    let q = parts
        .find_map(|x| x.strip_prefix("q="))
        .map_or(Some(1.0), |x| x.parse::<f32>().ok())?;

    Some((tag, q))
}
