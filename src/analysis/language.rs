//! Report languages and the instruction sent to the model for each.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    /// Name in the language itself, as shown in the language picker.
    pub name: &'static str,
    #[serde(skip)]
    pub prompt: &'static str,
}

pub const DEFAULT_LANGUAGE: &str = "en";

pub const LANGUAGES: &[Language] = &[
    Language {
        code: "en",
        name: "English",
        prompt: "Analyze this medical image in detail. Provide a comprehensive medical report including any visible conditions, abnormalities, or relevant medical observations. Format the response in a clear, professional manner suitable for medical documentation.",
    },
    Language {
        code: "fr",
        name: "Français",
        prompt: "Analysez cette image médicale en détail. Fournissez un rapport médical complet incluant toutes les conditions visibles, anomalies ou observations médicales pertinentes. Formatez la réponse de manière claire et professionnelle, adaptée à la documentation médicale.",
    },
    Language {
        code: "es",
        name: "Español",
        prompt: "Analice esta imagen médica en detalle. Proporcione un informe médico completo que incluya cualquier condición visible, anomalías u observaciones médicas relevantes. Formatee la respuesta de manera clara y profesional, adecuada para la documentación médica.",
    },
    Language {
        code: "de",
        name: "Deutsch",
        prompt: "Analysieren Sie dieses medizinische Bild im Detail. Erstellen Sie einen umfassenden medizinischen Bericht, der alle sichtbaren Erkrankungen, Abnormalitäten oder relevanten medizinischen Beobachtungen enthält. Formatieren Sie die Antwort klar und professionell, geeignet für die medizinische Dokumentation.",
    },
    Language {
        code: "it",
        name: "Italiano",
        prompt: "Analizzare questa immagine medica in dettaglio. Fornire un rapporto medico completo che includa eventuali condizioni visibili, anomalie o osservazioni mediche rilevanti. Formattare la risposta in modo chiaro e professionale, adatto alla documentazione medica.",
    },
    Language {
        code: "pt",
        name: "Português",
        prompt: "Analise esta imagem médica em detalhes. Forneça um relatório médico abrangente incluindo quaisquer condições visíveis, anomalias ou observações médicas relevantes. Formate a resposta de maneira clara e profissional, adequada para documentação médica.",
    },
    Language {
        code: "nl",
        name: "Nederlands",
        prompt: "Analyseer dit medische beeld in detail. Geef een uitgebreid medisch rapport met alle zichtbare aandoeningen, afwijkingen of relevante medische observaties. Formatteer het antwoord op een duidelijke, professionele manier die geschikt is voor medische documentatie.",
    },
    Language {
        code: "pl",
        name: "Polski",
        prompt: "Przeanalizuj szczegółowo ten obraz medyczny. Przedstaw kompleksowy raport medyczny zawierający wszystkie widoczne schorzenia, nieprawidłowości lub istotne obserwacje medyczne. Sformatuj odpowiedź w jasny, profesjonalny sposób odpowiedni do dokumentacji medycznej.",
    },
    Language {
        code: "ru",
        name: "Русский",
        prompt: "Проанализируйте это медицинское изображение подробно. Предоставьте комплексный медицинский отчет, включающий все видимые состояния, аномалии или соответствующие медицинские наблюдения. Отформатируйте ответ четко и профессионально, подходяще для медицинской документации.",
    },
    Language {
        code: "ja",
        name: "日本語",
        prompt: "この医療画像を詳細に分析してください。見られる症状、異常、または関連する医療観察を含む包括的な医療報告書を提供してください。医療文書に適した明確で専門的な形式で回答を構成してください。",
    },
    Language {
        code: "zh",
        name: "中文",
        prompt: "详细分析这张医疗图像。提供一份全面的医疗报告，包括任何可见的病症、异常或相关医疗观察。以清晰、专业的方式格式化回答，适合医疗文档。",
    },
    Language {
        code: "ko",
        name: "한국어",
        prompt: "이 의료 이미지를 자세히 분석하세요. 보이는 모든 상태, 이상 또는 관련 의료 관찰을 포함하는 포괄적인 의료 보고서를 제공하세요. 의료 문서에 적합한 명확하고 전문적인 방식으로 응답을 구성하세요.",
    },
    Language {
        code: "ar",
        name: "العربية",
        prompt: "قم بتحليل هذه الصورة الطبية بالتفصيل. قدم تقريراً طبياً شاملاً يتضمن أي حالات مرئية أو تشوهات أو ملاحظات طبية ذات صلة. قم بتنسيق الرد بطريقة واضحة ومهنية مناسبة للتوثيق الطبي.",
    },
];

/// Look up a language by its code (case-insensitive).
pub fn find_language(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Display name for a code, falling back to the code itself.
pub fn language_name(code: &str) -> &str {
    find_language(code).map(|l| l.name).unwrap_or(code)
}
