use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, RouteError};
use crate::io::telemetry::{PublishCoordinates, RouteMessage};
use crate::mapmatcher::{bridge, distinct_edges, match_coordinates};
use crate::models::{Coordinate, PriceModifier, Route};
use crate::pricer::Pricer;
use crate::reference_data::{ReferenceSource, with_retry};
use crate::road_graph::RoadNetwork;
use crate::route_matcher::{assemble, edge_table};
use crate::time_windows::resolve_windows;
use crate::transport::{Broker, Envelope};
use crate::trip_builder::build_route;

/// Turns a coordinate trace into an unpriced route over a shared road network.
pub struct RouteCalculator<N> {
    network: Arc<N>,
}

impl<N> Clone for RouteCalculator<N> {
    fn clone(&self) -> Self {
        Self {
            network: Arc::clone(&self.network),
        }
    }
}

impl<N: RoadNetwork> RouteCalculator<N> {
    pub fn new(network: Arc<N>) -> Self {
        Self { network }
    }

    pub fn map_to_route(&self, coordinates: &[Coordinate]) -> Result<Route> {
        let start_time = Instant::now();
        let network = self.network.as_ref();

        let matched = match_coordinates(network, coordinates)?;
        let bridged = bridge(network, &distinct_edges(&matched));
        let nodes = assemble(network, &matched, &bridged)?;
        let table = edge_table(network, &nodes);
        let windows = resolve_windows(&matched, coordinates, &table)?;
        let route = build_route(network, &nodes, &table, &windows)?;

        info!(
            "Mapped {} coordinates to {} segments in {:?}",
            coordinates.len(),
            route.segments.len(),
            start_time.elapsed()
        );
        Ok(route)
    }
}

/// Computes and prices the route for one inbound trace.
pub struct RouteHandler<N, R> {
    calculator: RouteCalculator<N>,
    pricer: Pricer,
    reference: R,
    modifiers: Vec<PriceModifier>,
    compute_timeout: Duration,
    reference_attempts: u32,
    reference_backoff: Duration,
}

impl<N, R> RouteHandler<N, R>
where
    N: RoadNetwork + Send + Sync + 'static,
    R: ReferenceSource,
{
    pub fn new(
        calculator: RouteCalculator<N>,
        pricer: Pricer,
        reference: R,
        modifiers: Vec<PriceModifier>,
    ) -> Self {
        Self {
            calculator,
            pricer,
            reference,
            modifiers,
            compute_timeout: Duration::from_secs(60),
            reference_attempts: 1,
            reference_backoff: Duration::ZERO,
        }
    }

    pub fn with_compute_timeout(mut self, timeout: Duration) -> Self {
        self.compute_timeout = timeout;
        self
    }

    pub fn with_reference_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.reference_attempts = attempts;
        self.reference_backoff = backoff;
        self
    }

    pub async fn handle(&self, request: &PublishCoordinates) -> Result<RouteMessage> {
        let coordinates = request.to_coordinates()?;
        debug!(
            "Handling {} coordinates for vehicle {}",
            coordinates.len(),
            request.vehicle_id
        );

        let calculator = self.calculator.clone();
        let computation =
            tokio::task::spawn_blocking(move || calculator.map_to_route(&coordinates));
        let route = match tokio::time::timeout(self.compute_timeout, computation).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(RouteError::Graph(format!("Route computation aborted: {}", e)));
            }
            Err(_) => return Err(RouteError::ComputationTimeout(self.compute_timeout)),
        };

        let vehicle = with_retry(
            "vehicle lookup",
            self.reference_attempts,
            self.reference_backoff,
            || self.reference.vehicle(request.vehicle_id),
        )
        .await?;
        let route = self.pricer.price(route, &vehicle, &self.modifiers);

        Ok(RouteMessage {
            vehicle_id: request.vehicle_id,
            route,
        })
    }
}

/// Consume, compute and publish loop over a broker subscription.
pub struct Receiver<B, N, R> {
    broker: B,
    handler: RouteHandler<N, R>,
    publish_exchange: String,
    route_message_type: String,
}

impl<B, N, R> Receiver<B, N, R>
where
    B: Broker,
    N: RoadNetwork + Send + Sync + 'static,
    R: ReferenceSource,
{
    pub fn new(
        broker: B,
        handler: RouteHandler<N, R>,
        publish_exchange: impl Into<String>,
        route_message_type: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            handler,
            publish_exchange: publish_exchange.into(),
            route_message_type: route_message_type.into(),
        }
    }

    /// Runs until the broker closes the subscription; returns the number of
    /// deliveries processed. Only broker failures end the loop early.
    pub async fn run(&mut self) -> Result<usize> {
        let mut processed = 0;

        while let Some(delivery) = self.broker.next_delivery().await? {
            let start_time = Instant::now();
            self.process(&delivery.body).await?;
            self.broker.ack(delivery.tag).await?;
            processed += 1;
            debug!("Delivery {} handled in {:?}", delivery.tag, start_time.elapsed());
        }

        info!("Subscription closed after {} deliveries", processed);
        Ok(processed)
    }

    async fn process(&mut self, body: &[u8]) -> Result<()> {
        let request: Envelope<PublishCoordinates> = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping undecodable message: {}", e);
                return Ok(());
            }
        };
        info!(
            "Message received - CorrelationId={}",
            request.correlation_id.as_deref().unwrap_or("-")
        );

        match self.handler.handle(&request.message).await {
            Ok(route) => {
                let response = request.respond(route, &self.route_message_type);
                let payload = serde_json::to_vec(&response)
                    .map_err(|e| RouteError::Transport(format!("Failed to encode route: {}", e)))?;
                self.broker.publish(&self.publish_exchange, payload).await?;
                info!(
                    "Published route {} for vehicle {}",
                    response.message.route.id, response.message.vehicle_id
                );
            }
            Err(e) => error!(
                "No route for vehicle {} [{}]: {}",
                request.message.vehicle_id,
                e.kind(),
                e
            ),
        }
        Ok(())
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }
}
