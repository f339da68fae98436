//! User-facing message templates and command detection.
//!
//! Terminal states (no balance, quota reached, erasure confirmation) have a
//! fixed user-facing message rather than an error; rendering beyond these
//! strings belongs to the transport adapter.

/// Fixed Spanish templates for terminal states and notices.
pub struct Messages;

impl Messages {
    /// Welcome text; mentions the initial grant for new users.
    pub fn welcome(is_new_user: bool) -> String {
        let grant_line = if is_new_user {
            "Te regalo **€1 de saldo** para tus primeras consultas.\n\n"
        } else {
            ""
        };

        format!(
            "¡Hola! Soy **Reco Extranjería** 🇪🇸\n\n{grant_line}Puedo ayudarte con información sobre:\n\
             • Renovación de NIE/TIE\n\
             • Arraigo social/laboral\n\
             • Reagrupación familiar\n\
             • Visados y permisos\n\
             • Nacionalidad española\n\n\
             ⚠️ **IMPORTANTE**: Esta información es orientativa, no constituye asesoría legal. \
             Para casos complejos, consulta un abogado especializado.\n\n\
             📱 Al usar este servicio aceptas el tratamiento de tus datos. Escribe **BAJA** para \
             eliminar todos tus datos.\n\n\
             ¿En qué puedo ayudarte?"
        )
    }

    /// Balance exhausted: top-up links per configured amount.
    pub fn no_credits(links: &[String]) -> String {
        let link_or = |index: usize| -> &str {
            links
                .get(index)
                .map(String::as_str)
                .filter(|l| !l.is_empty())
                .unwrap_or("Configurar link")
        };

        format!(
            "💰 **Tu saldo es €0**\n\n\
             Para continuar consultando, recarga tu saldo:\n\n\
             💳 **€5** → {}\n\
             💳 **€10** → {}\n\
             💳 **€15** → {}\n\n\
             Una vez realices el pago, tu saldo se actualizará automáticamente.",
            link_or(0),
            link_or(1),
            link_or(2)
        )
    }

    /// Quota cap reached.
    pub fn message_limit_reached() -> String {
        "📈 **Has alcanzado el límite de mensajes**\n\n\
         Has usado todos los mensajes disponibles por ahora. Si deseas continuar, responde con \
         \"RECARGAR\" o espera a que se restablezca tu cuota."
            .to_string()
    }

    /// Data-erasure confirmation.
    pub fn data_deleted() -> String {
        "✅ **Solicitud de baja procesada**\n\n\
         Hemos eliminado todos tus datos de nuestros sistemas.\n\n\
         Gracias por usar Reco Extranjería. Si necesitas ayuda en el futuro, puedes contactarnos \
         nuevamente."
            .to_string()
    }

    /// Moderation rejection.
    pub fn moderation_warning() -> String {
        "⚠️ **Contenido no apropiado**\n\n\
         Tu mensaje no cumple con nuestras normas de uso. Por favor, reformula tu consulta de \
         manera apropiada.\n\n\
         Recuerda que este servicio es para consultas sobre inmigración y extranjería en España."
            .to_string()
    }

    /// Generic technical-error notice.
    pub fn error() -> String {
        "🔧 **Error técnico temporal**\n\n\
         Tenemos dificultades técnicas en este momento.\n\n\
         Por favor, intenta de nuevo en unos minutos o contacta con un profesional para \
         consultas urgentes."
            .to_string()
    }
}

/// Whether the text is the data-erasure command.
pub fn is_baja_command(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("baja")
}

/// Whether the text is a bare greeting.
pub fn is_greeting(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "hola" | "hi" | "hello" | "buenas" | "hey"
    )
}

/// Read the configured top-up links.
///
/// Environment variables: `STRIPE_LINK_5_EUR`, `STRIPE_LINK_10_EUR`,
/// `STRIPE_LINK_15_EUR`. Missing links render as a placeholder.
pub fn payment_links_from_env() -> Vec<String> {
    ["STRIPE_LINK_5_EUR", "STRIPE_LINK_10_EUR", "STRIPE_LINK_15_EUR"]
        .iter()
        .map(|key| std::env::var(key).unwrap_or_default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baja_command_detection() {
        assert!(is_baja_command("BAJA"));
        assert!(is_baja_command("  baja "));
        assert!(is_baja_command("Baja"));
        assert!(!is_baja_command("quiero darme de baja"));
    }

    #[test]
    fn test_greeting_detection() {
        assert!(is_greeting("hola"));
        assert!(is_greeting("  Hola "));
        assert!(is_greeting("BUENAS"));
        assert!(!is_greeting("hola, ¿qué es un NIE?"));
    }

    #[test]
    fn test_welcome_mentions_grant_only_for_new_users() {
        assert!(Messages::welcome(true).contains("€1 de saldo"));
        assert!(!Messages::welcome(false).contains("€1 de saldo"));
    }

    #[test]
    fn test_no_credits_renders_links_or_placeholder() {
        let with_links = Messages::no_credits(&[
            "https://pay.example/5".to_string(),
            "https://pay.example/10".to_string(),
            String::new(),
        ]);
        assert!(with_links.contains("https://pay.example/5"));
        assert!(with_links.contains("https://pay.example/10"));
        assert!(with_links.contains("Configurar link"));
    }
}
