use std::{pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, ListingSoldEvent, ReservationCancelledEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub listing_sold_producer: Vec<EventProducer<ListingSoldEvent>>,
    pub reservation_cancelled_producer: Vec<EventProducer<ReservationCancelledEvent>>,
}

pub struct EventHandlers {
    pub on_listing_sold: Option<EventHandler<ListingSoldEvent>>,
    pub on_reservation_cancelled: Option<EventHandler<ReservationCancelledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_listing_sold = hooks.on_listing_sold.map(|f| EventHandler::new(buffer_size, f));
        let on_reservation_cancelled = hooks.on_reservation_cancelled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_listing_sold, on_reservation_cancelled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_listing_sold {
            result.listing_sold_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_reservation_cancelled {
            result.reservation_cancelled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_listing_sold {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_reservation_cancelled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_listing_sold: Option<Handler<ListingSoldEvent>>,
    pub on_reservation_cancelled: Option<Handler<ReservationCancelledEvent>>,
}

impl EventHooks {
    pub fn on_listing_sold<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ListingSoldEvent) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + Sync + 'static
    {
        self.on_listing_sold = Some(Arc::new(f));
        self
    }

    pub fn on_reservation_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReservationCancelledEvent) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>>)
            + Send
            + Sync
            + 'static {
        self.on_reservation_cancelled = Some(Arc::new(f));
        self
    }
}
