use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Desconexión diferida por inactividad: espera `delay` y vuelve a
/// consultar el estado vivo con `probe`. Solo si la sonda sigue
/// reportando "bot solo y conectado al mismo canal" se ejecuta `action`.
///
/// No hay token de cancelación: una presencia humana durante la espera se
/// detecta en la re-consulta y el chequeo se abandona en silencio. Varios
/// armados solapados para el mismo guild son tolerables porque cada
/// re-consulta mira el estado vivo y el cleanup es idempotente.
pub async fn delayed_leave_check<P, A>(delay: Duration, probe: P, action: A)
where
    P: Future<Output = bool> + Send,
    A: Future<Output = ()> + Send,
{
    tokio::time::sleep(delay).await;

    if probe.await {
        action.await;
    } else {
        debug!("🚪 Desconexión por inactividad abandonada: hay presencia o ya no hay conexión");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fires_action_when_still_alone() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        delayed_leave_check(
            Duration::from_millis(10),
            async { true },
            async move {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandons_when_presence_returns() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let alone = Arc::new(AtomicUsize::new(1));
        let alone_probe = alone.clone();

        let check = tokio::spawn(delayed_leave_check(
            Duration::from_millis(50),
            async move { alone_probe.load(Ordering::SeqCst) == 1 },
            async move {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        ));

        // Alguien vuelve al canal durante la espera
        tokio::time::sleep(Duration::from_millis(10)).await;
        alone.store(0, Ordering::SeqCst);

        check.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlapping_arms_are_independent() {
        let fired = Arc::new(AtomicUsize::new(0));

        let mut checks = Vec::new();
        for _ in 0..3 {
            let fired_clone = fired.clone();
            checks.push(tokio::spawn(delayed_leave_check(
                Duration::from_millis(10),
                async { true },
                async move {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                },
            )));
        }

        for check in checks {
            check.await.unwrap();
        }

        // Cada ventana corre por su cuenta; la acción (cleanup) es
        // idempotente, así que los disparos redundantes son inofensivos
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }
}
