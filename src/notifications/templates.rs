//! Localized email copy. Subjects and bodies exist for every shipped
//! locale; the locale enum itself guarantees the English fallback since
//! unknown languages never reach here.

use super::{ConfirmationEmail, RecoveryEmail};
use crate::catalog::PackageId;
use crate::i18n::Locale;

pub fn confirmation_subject(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Your photoshoot is booked!",
        Locale::Tr => "Fotoğraf çekiminiz onaylandı!",
        Locale::Ar => "تم تأكيد جلسة التصوير الخاصة بك!",
        Locale::Ru => "Ваша фотосессия забронирована!",
        Locale::Es => "¡Tu sesión de fotos está reservada!",
    }
}

pub fn recovery_subject(locale: Locale) -> &'static str {
    match locale {
        Locale::En => "Your photoshoot is still waiting for you",
        Locale::Tr => "Fotoğraf çekiminiz sizi bekliyor",
        Locale::Ar => "جلسة التصوير الخاصة بك ما زالت بانتظارك",
        Locale::Ru => "Ваша фотосессия всё ещё ждёт вас",
        Locale::Es => "Tu sesión de fotos sigue esperándote",
    }
}

fn package_label(package_id: PackageId, locale: Locale) -> &'static str {
    use Locale::*;
    use PackageId::*;
    match (package_id, locale) {
        (Essential, En) => "Essential package",
        (Essential, Tr) => "Essential paketi",
        (Essential, Ar) => "باقة Essential",
        (Essential, Ru) => "Пакет Essential",
        (Essential, Es) => "Paquete Essential",
        (Premium, En) => "Premium package",
        (Premium, Tr) => "Premium paketi",
        (Premium, Ar) => "باقة Premium",
        (Premium, Ru) => "Пакет Premium",
        (Premium, Es) => "Paquete Premium",
        (Luxury, En) => "Luxury package",
        (Luxury, Tr) => "Luxury paketi",
        (Luxury, Ar) => "باقة Luxury",
        (Luxury, Ru) => "Пакет Luxury",
        (Luxury, Es) => "Paquete Luxury",
        (Rooftop, En) => "Rooftop package",
        (Rooftop, Tr) => "Rooftop paketi",
        (Rooftop, Ar) => "باقة Rooftop",
        (Rooftop, Ru) => "Пакет Rooftop",
        (Rooftop, Es) => "Paquete Rooftop",
    }
}

pub fn confirmation_body(email: &ConfirmationEmail) -> String {
    let package = package_label(email.package_id, email.locale);
    let greeting = match email.locale {
        Locale::En => format!("Hi {},", email.customer_name),
        Locale::Tr => format!("Merhaba {},", email.customer_name),
        Locale::Ar => format!("مرحباً {}،", email.customer_name),
        Locale::Ru => format!("Здравствуйте, {}!", email.customer_name),
        Locale::Es => format!("Hola {}:", email.customer_name),
    };
    let line = match email.locale {
        Locale::En => "Your booking is confirmed. We look forward to seeing you!",
        Locale::Tr => "Rezervasyonunuz onaylandı. Sizi görmek için sabırsızlanıyoruz!",
        Locale::Ar => "تم تأكيد حجزك. نتطلع لرؤيتك!",
        Locale::Ru => "Ваше бронирование подтверждено. Ждём вас!",
        Locale::Es => "Tu reserva está confirmada. ¡Te esperamos!",
    };

    format!(
        "<p>{greeting}</p>\
         <p>{line}</p>\
         <p><strong>{package}</strong><br/>\
         {date} · {time}<br/>\
         {amount} {currency}</p>",
        date = email.booking_date.format("%d.%m.%Y"),
        time = email.booking_time,
        amount = email.total_amount,
        currency = email.currency,
    )
}

pub fn recovery_body(email: &RecoveryEmail) -> String {
    let package = package_label(email.package_id, email.locale);
    let greeting = match email.locale {
        Locale::En => format!("Hi {},", email.customer_name),
        Locale::Tr => format!("Merhaba {},", email.customer_name),
        Locale::Ar => format!("مرحباً {}،", email.customer_name),
        Locale::Ru => format!("Здравствуйте, {}!", email.customer_name),
        Locale::Es => format!("Hola {}:", email.customer_name),
    };
    let line = match email.locale {
        Locale::En => "You were one step away from booking your photoshoot. Your selection is saved — pick up right where you left off.",
        Locale::Tr => "Fotoğraf çekiminizi ayırtmanıza bir adım kalmıştı. Seçiminiz kayıtlı, kaldığınız yerden devam edebilirsiniz.",
        Locale::Ar => "كنت على بُعد خطوة واحدة من حجز جلسة التصوير. اختيارك محفوظ، أكمل من حيث توقفت.",
        Locale::Ru => "Вам оставался один шаг до бронирования фотосессии. Ваш выбор сохранён — продолжите с того места, где остановились.",
        Locale::Es => "Estabas a un paso de reservar tu sesión de fotos. Tu selección está guardada: continúa donde lo dejaste.",
    };
    let cta = match email.locale {
        Locale::En => "Complete my booking",
        Locale::Tr => "Rezervasyonumu tamamla",
        Locale::Ar => "إكمال الحجز",
        Locale::Ru => "Завершить бронирование",
        Locale::Es => "Completar mi reserva",
    };

    format!(
        "<p>{greeting}</p>\
         <p>{line}</p>\
         <p><strong>{package}</strong></p>\
         <p><a href=\"{url}\">{cta}</a></p>",
        url = email.resume_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn every_locale_has_subjects() {
        for locale in Locale::ALL {
            assert!(!confirmation_subject(locale).is_empty());
            assert!(!recovery_subject(locale).is_empty());
        }
    }

    #[test]
    fn bodies_carry_booking_facts_in_every_locale() {
        for locale in Locale::ALL {
            let body = confirmation_body(&ConfirmationEmail {
                to: "x@example.com".into(),
                customer_name: "Jane".into(),
                package_id: PackageId::Rooftop,
                booking_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                booking_time: "17:30".into(),
                total_amount: dec!(450.00),
                currency: "EUR".into(),
                locale,
            });
            assert!(body.contains("Jane"));
            assert!(body.contains("01.06.2025"));
            assert!(body.contains("17:30"));
            assert!(body.contains("450.00"));
        }
    }

    #[test]
    fn recovery_body_links_back_to_checkout() {
        let body = recovery_body(&RecoveryEmail {
            to: "x@example.com".into(),
            customer_name: "Иван".into(),
            package_id: PackageId::Premium,
            resume_url: "https://studiovista.co/checkout?draft=abc".into(),
            locale: Locale::Ru,
        });
        assert!(body.contains("https://studiovista.co/checkout?draft=abc"));
        assert!(body.contains("Иван"));
    }
}
