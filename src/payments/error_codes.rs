//! Card-payment decline code mapping.
//!
//! The card provider answers failed initializations with a numeric error
//! code. This table normalizes every known code into a stable category and
//! a localized user-facing message plus remediation suggestion. Unknown
//! codes resolve to a generic pair; lookups never fail.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::i18n::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    InvalidCard,
    InsufficientFunds,
    CardDeclined,
    ExpiredCard,
    InvalidCvc,
    CardRestricted,
    FraudCheck,
    SecurityBlock,
    ThreeDsFailed,
    LimitExceeded,
    InvalidTransaction,
    SystemError,
    Unknown,
}

/// Resolved decline information handed to the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct DeclineInfo {
    pub category: ErrorCategory,
    pub message: &'static str,
    pub suggestion: &'static str,
}

/// Every provider error code we recognize, with its category. Bank response
/// codes (two digits) arrive on direct-debit fallbacks and are mapped the
/// same way.
pub const CODE_CATEGORIES: &[(&str, ErrorCategory)] = &[
    // Card number / account problems
    ("10213", ErrorCategory::InvalidCard),
    ("10215", ErrorCategory::InvalidCard),
    ("10220", ErrorCategory::InvalidCard),
    ("12", ErrorCategory::InvalidCard),
    ("14", ErrorCategory::InvalidCard),
    ("15", ErrorCategory::InvalidCard),
    // Balance
    ("10051", ErrorCategory::InsufficientFunds),
    ("51", ErrorCategory::InsufficientFunds),
    // Issuer said no without a usable reason
    ("10005", ErrorCategory::CardDeclined),
    ("10201", ErrorCategory::CardDeclined),
    ("10203", ErrorCategory::CardDeclined),
    ("10207", ErrorCategory::CardDeclined),
    ("10242", ErrorCategory::CardDeclined),
    ("05", ErrorCategory::CardDeclined),
    ("34", ErrorCategory::CardDeclined),
    // Expiry
    ("10054", ErrorCategory::ExpiredCard),
    ("10229", ErrorCategory::ExpiredCard),
    ("33", ErrorCategory::ExpiredCard),
    ("54", ErrorCategory::ExpiredCard),
    // CVC
    ("10084", ErrorCategory::InvalidCvc),
    ("10206", ErrorCategory::InvalidCvc),
    ("82", ErrorCategory::InvalidCvc),
    // Card exists but is closed to this kind of payment
    ("10041", ErrorCategory::CardRestricted),
    ("10043", ErrorCategory::CardRestricted),
    ("10057", ErrorCategory::CardRestricted),
    ("10058", ErrorCategory::CardRestricted),
    ("10093", ErrorCategory::CardRestricted),
    ("10209", ErrorCategory::CardRestricted),
    ("10225", ErrorCategory::CardRestricted),
    ("10233", ErrorCategory::CardRestricted),
    ("36", ErrorCategory::CardRestricted),
    ("57", ErrorCategory::CardRestricted),
    ("62", ErrorCategory::CardRestricted),
    // Fraud screening
    ("10034", ErrorCategory::FraudCheck),
    ("10094", ErrorCategory::FraudCheck),
    ("59", ErrorCategory::FraudCheck),
    // Security verification
    ("10210", ErrorCategory::SecurityBlock),
    ("10211", ErrorCategory::SecurityBlock),
    ("10212", ErrorCategory::SecurityBlock),
    ("10226", ErrorCategory::SecurityBlock),
    ("10227", ErrorCategory::SecurityBlock),
    // 3-D Secure outcomes
    ("6001", ErrorCategory::ThreeDsFailed),
    ("6002", ErrorCategory::ThreeDsFailed),
    ("6003", ErrorCategory::ThreeDsFailed),
    ("6004", ErrorCategory::ThreeDsFailed),
    ("6005", ErrorCategory::ThreeDsFailed),
    // Limits
    ("10234", ErrorCategory::LimitExceeded),
    ("10236", ErrorCategory::LimitExceeded),
    ("61", ErrorCategory::LimitExceeded),
    ("65", ErrorCategory::LimitExceeded),
    // Request was well-formed but the transaction itself is not allowed
    ("10012", ErrorCategory::InvalidTransaction),
    ("10202", ErrorCategory::InvalidTransaction),
    ("10222", ErrorCategory::InvalidTransaction),
    ("10232", ErrorCategory::InvalidTransaction),
    ("10238", ErrorCategory::InvalidTransaction),
    ("03", ErrorCategory::InvalidTransaction),
    ("13", ErrorCategory::InvalidTransaction),
    // Provider/issuer infrastructure
    ("10204", ErrorCategory::SystemError),
    ("10208", ErrorCategory::SystemError),
    ("10214", ErrorCategory::SystemError),
    ("10216", ErrorCategory::SystemError),
    ("10217", ErrorCategory::SystemError),
    ("10219", ErrorCategory::SystemError),
    ("10223", ErrorCategory::SystemError),
    ("10228", ErrorCategory::SystemError),
    ("91", ErrorCategory::SystemError),
    ("96", ErrorCategory::SystemError),
];

static CODE_INDEX: Lazy<HashMap<&'static str, ErrorCategory>> =
    Lazy::new(|| CODE_CATEGORIES.iter().copied().collect());

/// Maps a provider error code to its category. Unknown codes are not an
/// error condition.
pub fn categorize(code: &str) -> ErrorCategory {
    CODE_INDEX
        .get(code.trim())
        .copied()
        .unwrap_or(ErrorCategory::Unknown)
}

/// Resolves the full localized decline pair for a provider error code.
pub fn lookup(code: &str, locale: Locale) -> DeclineInfo {
    let category = categorize(code);
    DeclineInfo {
        category,
        message: message(category, locale),
        suggestion: suggestion(category, locale),
    }
}

fn message(category: ErrorCategory, locale: Locale) -> &'static str {
    use ErrorCategory::*;
    use Locale::*;
    match (category, locale) {
        (InvalidCard, En) => "The card number is invalid.",
        (InvalidCard, Tr) => "Kart numarası geçersiz.",
        (InvalidCard, Ar) => "رقم البطاقة غير صالح.",
        (InvalidCard, Ru) => "Неверный номер карты.",
        (InvalidCard, Es) => "El número de tarjeta no es válido.",

        (InsufficientFunds, En) => "The card has insufficient funds.",
        (InsufficientFunds, Tr) => "Kart bakiyesi yetersiz.",
        (InsufficientFunds, Ar) => "رصيد البطاقة غير كافٍ.",
        (InsufficientFunds, Ru) => "На карте недостаточно средств.",
        (InsufficientFunds, Es) => "La tarjeta no tiene fondos suficientes.",

        (CardDeclined, En) => "The card was declined by the issuing bank.",
        (CardDeclined, Tr) => "Kart, bankanız tarafından reddedildi.",
        (CardDeclined, Ar) => "رفض البنك المُصدر البطاقة.",
        (CardDeclined, Ru) => "Карта отклонена банком-эмитентом.",
        (CardDeclined, Es) => "El banco emisor rechazó la tarjeta.",

        (ExpiredCard, En) => "The card has expired or the expiry date is wrong.",
        (ExpiredCard, Tr) => "Kartın son kullanma tarihi geçmiş veya hatalı.",
        (ExpiredCard, Ar) => "انتهت صلاحية البطاقة أو تاريخ الانتهاء خاطئ.",
        (ExpiredCard, Ru) => "Срок действия карты истёк или указан неверно.",
        (ExpiredCard, Es) => "La tarjeta está caducada o la fecha es incorrecta.",

        (InvalidCvc, En) => "The security code (CVC) is invalid.",
        (InvalidCvc, Tr) => "Güvenlik kodu (CVC) geçersiz.",
        (InvalidCvc, Ar) => "رمز الأمان (CVC) غير صالح.",
        (InvalidCvc, Ru) => "Неверный код безопасности (CVC).",
        (InvalidCvc, Es) => "El código de seguridad (CVC) no es válido.",

        (CardRestricted, En) => "This card is not allowed for this type of payment.",
        (CardRestricted, Tr) => "Bu kart bu ödeme türüne kapalı.",
        (CardRestricted, Ar) => "هذه البطاقة غير مسموح بها لهذا النوع من الدفع.",
        (CardRestricted, Ru) => "Эта карта не поддерживает такой тип платежа.",
        (CardRestricted, Es) => "Esta tarjeta no admite este tipo de pago.",

        (FraudCheck, En) => "The payment was flagged by fraud checks.",
        (FraudCheck, Tr) => "Ödeme, dolandırıcılık kontrollerine takıldı.",
        (FraudCheck, Ar) => "تم إيقاف الدفع بسبب فحوصات الاحتيال.",
        (FraudCheck, Ru) => "Платёж остановлен проверкой на мошенничество.",
        (FraudCheck, Es) => "El pago fue bloqueado por los controles antifraude.",

        (SecurityBlock, En) => "The payment failed a security verification step.",
        (SecurityBlock, Tr) => "Ödeme güvenlik doğrulamasından geçemedi.",
        (SecurityBlock, Ar) => "فشل الدفع في خطوة التحقق الأمني.",
        (SecurityBlock, Ru) => "Платёж не прошёл проверку безопасности.",
        (SecurityBlock, Es) => "El pago no superó la verificación de seguridad.",

        (ThreeDsFailed, En) => "3-D Secure verification failed.",
        (ThreeDsFailed, Tr) => "3-D Secure doğrulaması başarısız oldu.",
        (ThreeDsFailed, Ar) => "فشل التحقق عبر 3-D Secure.",
        (ThreeDsFailed, Ru) => "Проверка 3-D Secure не пройдена.",
        (ThreeDsFailed, Es) => "Falló la verificación 3-D Secure.",

        (LimitExceeded, En) => "The card's spending limit was exceeded.",
        (LimitExceeded, Tr) => "Kart harcama limiti aşıldı.",
        (LimitExceeded, Ar) => "تم تجاوز حد الإنفاق للبطاقة.",
        (LimitExceeded, Ru) => "Превышен лимит расходов по карте.",
        (LimitExceeded, Es) => "Se superó el límite de gasto de la tarjeta.",

        (InvalidTransaction, En) => "The transaction was rejected as invalid.",
        (InvalidTransaction, Tr) => "İşlem geçersiz olarak reddedildi.",
        (InvalidTransaction, Ar) => "رُفضت العملية لكونها غير صالحة.",
        (InvalidTransaction, Ru) => "Операция отклонена как недопустимая.",
        (InvalidTransaction, Es) => "La operación fue rechazada por no ser válida.",

        (SystemError, En) => "The payment provider had a temporary problem.",
        (SystemError, Tr) => "Ödeme sağlayıcısında geçici bir sorun oluştu.",
        (SystemError, Ar) => "حدثت مشكلة مؤقتة لدى مزود الدفع.",
        (SystemError, Ru) => "Временная проблема на стороне платёжного провайдера.",
        (SystemError, Es) => "El proveedor de pagos tuvo un problema temporal.",

        (Unknown, En) => "The payment could not be completed.",
        (Unknown, Tr) => "Ödeme tamamlanamadı.",
        (Unknown, Ar) => "تعذر إتمام الدفع.",
        (Unknown, Ru) => "Не удалось завершить платёж.",
        (Unknown, Es) => "No se pudo completar el pago.",
    }
}

fn suggestion(category: ErrorCategory, locale: Locale) -> &'static str {
    use ErrorCategory::*;
    use Locale::*;
    match (category, locale) {
        (InvalidCard, En) => "Check the card number and try again.",
        (InvalidCard, Tr) => "Kart numarasını kontrol edip tekrar deneyin.",
        (InvalidCard, Ar) => "تحقق من رقم البطاقة وحاول مرة أخرى.",
        (InvalidCard, Ru) => "Проверьте номер карты и попробуйте снова.",
        (InvalidCard, Es) => "Comprueba el número de la tarjeta e inténtalo de nuevo.",

        (InsufficientFunds, En) => {
            "Check your card balance or try a different payment method."
        }
        (InsufficientFunds, Tr) => {
            "Kart bakiyenizi kontrol edin veya farklı bir ödeme yöntemi deneyin."
        }
        (InsufficientFunds, Ar) => "تحقق من رصيد بطاقتك أو جرّب وسيلة دفع أخرى.",
        (InsufficientFunds, Ru) => {
            "Проверьте баланс карты или попробуйте другой способ оплаты."
        }
        (InsufficientFunds, Es) => {
            "Comprueba el saldo de tu tarjeta o prueba otro método de pago."
        }

        (CardDeclined, En) => "Contact your bank or try a different card.",
        (CardDeclined, Tr) => "Bankanızla iletişime geçin veya başka bir kart deneyin.",
        (CardDeclined, Ar) => "تواصل مع البنك أو جرّب بطاقة أخرى.",
        (CardDeclined, Ru) => "Свяжитесь с банком или попробуйте другую карту.",
        (CardDeclined, Es) => "Contacta con tu banco o prueba con otra tarjeta.",

        (ExpiredCard, En) => "Check the expiry date or use another card.",
        (ExpiredCard, Tr) => "Son kullanma tarihini kontrol edin veya başka bir kart kullanın.",
        (ExpiredCard, Ar) => "تحقق من تاريخ الانتهاء أو استخدم بطاقة أخرى.",
        (ExpiredCard, Ru) => "Проверьте срок действия или используйте другую карту.",
        (ExpiredCard, Es) => "Comprueba la fecha de caducidad o usa otra tarjeta.",

        (InvalidCvc, En) => "Check the 3-digit code on the back of your card.",
        (InvalidCvc, Tr) => "Kartınızın arkasındaki 3 haneli kodu kontrol edin.",
        (InvalidCvc, Ar) => "تحقق من الرمز المكوّن من 3 أرقام خلف البطاقة.",
        (InvalidCvc, Ru) => "Проверьте трёхзначный код на обороте карты.",
        (InvalidCvc, Es) => "Comprueba el código de 3 dígitos del reverso de la tarjeta.",

        (CardRestricted, En) => {
            "Enable online payments for your card or use another one."
        }
        (CardRestricted, Tr) => {
            "Kartınızı internet alışverişine açtırın veya başka bir kart kullanın."
        }
        (CardRestricted, Ar) => "فعّل الدفع عبر الإنترنت لبطاقتك أو استخدم بطاقة أخرى.",
        (CardRestricted, Ru) => {
            "Включите онлайн-платежи для карты или используйте другую."
        }
        (CardRestricted, Es) => "Activa los pagos en línea de tu tarjeta o usa otra.",

        (FraudCheck, En) => "Contact your bank to approve the transaction, then retry.",
        (FraudCheck, Tr) => "İşlemi onaylatmak için bankanızla görüşüp tekrar deneyin.",
        (FraudCheck, Ar) => "تواصل مع البنك للموافقة على العملية ثم أعد المحاولة.",
        (FraudCheck, Ru) => {
            "Свяжитесь с банком для подтверждения операции и повторите попытку."
        }
        (FraudCheck, Es) => {
            "Contacta con tu banco para aprobar la operación y vuelve a intentarlo."
        }

        (SecurityBlock, En) => "Complete 3-D Secure verification or try another card.",
        (SecurityBlock, Tr) => "3-D Secure doğrulamasını tamamlayın veya başka bir kart deneyin.",
        (SecurityBlock, Ar) => "أكمل خطوة التحقق 3-D Secure أو جرّب بطاقة أخرى.",
        (SecurityBlock, Ru) => "Пройдите проверку 3-D Secure или попробуйте другую карту.",
        (SecurityBlock, Es) => "Completa la verificación 3-D Secure o prueba otra tarjeta.",

        (ThreeDsFailed, En) => "Retry and complete the verification step sent by your bank.",
        (ThreeDsFailed, Tr) => {
            "Bankanızın gönderdiği doğrulama adımını tamamlayıp tekrar deneyin."
        }
        (ThreeDsFailed, Ar) => "أعد المحاولة وأكمل خطوة التحقق المرسلة من البنك.",
        (ThreeDsFailed, Ru) => "Повторите попытку и завершите подтверждение из банка.",
        (ThreeDsFailed, Es) => {
            "Inténtalo de nuevo y completa la verificación enviada por tu banco."
        }

        (LimitExceeded, En) => "Raise your card limit or split the payment.",
        (LimitExceeded, Tr) => "Kart limitinizi yükseltin veya ödemeyi bölün.",
        (LimitExceeded, Ar) => "ارفع حد بطاقتك أو قسّم الدفعة.",
        (LimitExceeded, Ru) => "Увеличьте лимит карты или разделите платёж.",
        (LimitExceeded, Es) => "Amplía el límite de tu tarjeta o divide el pago.",

        (InvalidTransaction, En) => "Try again, or contact support if it keeps failing.",
        (InvalidTransaction, Tr) => {
            "Tekrar deneyin, sorun devam ederse destek ekibiyle iletişime geçin."
        }
        (InvalidTransaction, Ar) => "أعد المحاولة، وإذا استمرت المشكلة تواصل مع الدعم.",
        (InvalidTransaction, Ru) => "Повторите попытку или обратитесь в поддержку.",
        (InvalidTransaction, Es) => "Inténtalo de nuevo o contacta con soporte si persiste.",

        (SystemError, En) => "Please try again in a few minutes.",
        (SystemError, Tr) => "Lütfen birkaç dakika sonra tekrar deneyin.",
        (SystemError, Ar) => "يرجى المحاولة مرة أخرى بعد دقائق.",
        (SystemError, Ru) => "Пожалуйста, повторите попытку через несколько минут.",
        (SystemError, Es) => "Inténtalo de nuevo en unos minutos.",

        (Unknown, En) => "Try again or contact support if the problem persists.",
        (Unknown, Tr) => "Tekrar deneyin, sorun devam ederse destekle iletişime geçin.",
        (Unknown, Ar) => "أعد المحاولة أو تواصل مع الدعم إذا استمرت المشكلة.",
        (Unknown, Ru) => "Повторите попытку или обратитесь в поддержку.",
        (Unknown, Es) => {
            "Inténtalo de nuevo o contacta con soporte si el problema persiste."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_code_has_text_in_every_locale() {
        for (code, expected_category) in CODE_CATEGORIES {
            assert_eq!(categorize(code), *expected_category, "code {}", code);
            for locale in Locale::ALL {
                let info = lookup(code, locale);
                assert_eq!(info.category, *expected_category);
                assert!(!info.message.is_empty(), "{} {}", code, locale);
                assert!(!info.suggestion.is_empty(), "{} {}", code, locale);
            }
        }
    }

    #[test]
    fn unknown_codes_resolve_to_generic_pair() {
        for locale in Locale::ALL {
            let info = lookup("99999", locale);
            assert_eq!(info.category, ErrorCategory::Unknown);
            assert!(!info.message.is_empty());
            assert!(!info.suggestion.is_empty());
        }
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(categorize(" 10051 "), ErrorCategory::InsufficientFunds);
    }

    #[test]
    fn well_known_codes_map_to_expected_categories() {
        assert_eq!(categorize("10051"), ErrorCategory::InsufficientFunds);
        assert_eq!(categorize("10054"), ErrorCategory::ExpiredCard);
        assert_eq!(categorize("10034"), ErrorCategory::FraudCheck);
        assert_eq!(categorize("10005"), ErrorCategory::CardDeclined);
        assert_eq!(categorize("6001"), ErrorCategory::ThreeDsFailed);
    }
}
