//! Remote command surface over the MQTT agent.
//!
//! | Module       | Role                                              |
//! |--------------|---------------------------------------------------|
//! | `gates`      | connected / maintenance readiness flags           |
//! | `agent`      | correlated subscribe/publish with bounded waits   |
//! | `acks`       | completions parked by transport message id        |
//! | `router`     | topic-filter → handler delivery                   |
//! | `buffer`     | bounded NUL-terminated receive buffer             |
//! | `dispatcher` | JSON decode and command hand-off                  |

pub mod acks;
pub mod agent;
pub mod buffer;
pub mod dispatcher;
pub mod gates;
pub mod router;
