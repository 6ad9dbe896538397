use whatlang::Lang;

pub const UNDETERMINED: &str = "und";

/// Statistical language identification. Returns an ISO 639-1 code where one
/// exists (the codes the translation jobs key on), otherwise ISO 639-3.
pub fn identify(text: &str) -> String {
    match whatlang::detect(text) {
        Some(info) => iso639_1(info.lang())
            .unwrap_or_else(|| info.lang().code())
            .to_string(),
        None => UNDETERMINED.to_string(),
    }
}

fn iso639_1(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Hin => "hi",
        Lang::Ben => "bn",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Mal => "ml",
        Lang::Kan => "kn",
        Lang::Guj => "gu",
        Lang::Mar => "mr",
        Lang::Pan => "pa",
        Lang::Ori => "or",
        Lang::Urd => "ur",
        Lang::Nep => "ne",
        Lang::Sin => "si",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Spa => "es",
        Lang::Rus => "ru",
        Lang::Ara => "ar",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_and_hindi() {
        assert_eq!(
            identify("The Union Cabinet chaired by the Prime Minister has approved the proposal for the new scheme."),
            "en"
        );
        assert_eq!(
            identify("प्रधानमंत्री की अध्यक्षता में केंद्रीय मंत्रिमंडल ने नई योजना के प्रस्ताव को मंजूरी दे दी है।"),
            "hi"
        );
    }

    #[test]
    fn nothing_to_identify() {
        assert_eq!(identify(""), UNDETERMINED);
    }
}
