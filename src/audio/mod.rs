//! # Audio Module
//!
//! Sistema de reproducción por guild para Ritmo Bot.
//!
//! La lógica está repartida en tres piezas:
//!
//! - [`state`] - la máquina de estados por guild: cola FIFO, pista actual,
//!   modos de repetición y la política de selección de la siguiente pista
//! - [`controller`] - el dueño del mapa guild -> estado; ciclo de vida,
//!   encolado, avance y operaciones sobre la cola
//! - [`events`] - el callback de fin de pista de songbird, que reingresa
//!   al controlador desde el contexto del driver de voz
//! - [`idle`] - la desconexión automática cuando el bot queda solo
//!
//! Ningún componente fuera del controlador lee o muta el estado de un
//! guild directamente; la capa de presentación recibe solo snapshots.

pub mod controller;
pub mod events;
pub mod idle;
pub mod state;

use thiserror::Error;

/// Errores de las operaciones de reproducción. Los de entrada de usuario se
/// reportan sin cambiar estado; los de transporte pueden forzar un cleanup.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Debes estar conectado a un canal de voz")]
    UserNotInVoiceChannel,

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("La cola está vacía")]
    EmptyQueue,

    #[error("La posición {0} está fuera de rango")]
    InvalidIndex(usize),

    #[error("No se encontró ninguna canción que coincida con «{0}»")]
    NoMatch(String),

    #[error("Varias canciones coinciden: {}", .0.join(", "))]
    AmbiguousMatch(Vec<String>),

    #[error("Tiempo de espera agotado al conectar al canal de voz")]
    ConnectTimeout,

    #[error("No se pudo conectar al canal de voz: {0}")]
    JoinFailed(String),

    #[error("Error de reproducción: {0}")]
    Playback(String),
}

/// Resultado especializado para operaciones de reproducción.
pub type PlayerResult<T> = Result<T, PlayerError>;
