//! BlueZ binding.
//!
//! Powers the default adapter, registers the provisioning GATT application and
//! advertises it under the device name. Reads are answered from the
//! [`StatusPublisher`](super::StatusPublisher), writes are handed to the
//! [`RouterHandle`] and notify sessions forward every published value.
//!
//! **Note:** This module is only available with the `bluez` feature.

use super::{CharacteristicBinding, RouterHandle};
use crate::agent::Agent;
use crate::config::uuids::SERVICE_UUID;
use crate::gatt::{NotifySession, StatusPublisher};
use bluer::adv::{Advertisement, AdvertisementHandle, Type};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicWrite,
    CharacteristicWriteMethod, ReqError, Service,
};
use bluer::{Adapter, Session};
use futures::FutureExt;
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Failed to bring up the BLE side. Fatal.
#[derive(Debug)]
pub struct PlatformError {
    /// What was being done.
    pub stage: &'static str,
    pub source: bluer::Error,
}

impl PlatformError {
    fn at(stage: &'static str) -> impl FnOnce(bluer::Error) -> Self {
        move |source| Self { stage, source }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BLE {} failed: {}", self.stage, self.source)
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Live registration. Dropping it unregisters everything.
pub struct GattRegistration {
    _session: Session,
    _adapter: Adapter,
    application: ApplicationHandle,
    advertisement: Option<AdvertisementHandle>,
}

impl GattRegistration {
    pub fn stop_advertising(&mut self) {
        if self.advertisement.take().is_some() {
            info!("Advertising stopped");
        }
    }

    pub fn unregister(self) {
        let Self {
            application,
            advertisement,
            ..
        } = self;
        drop(advertisement);
        drop(application);
        info!("GATT application unregistered");
    }
}

/// Register the agent's service with BlueZ and start advertising.
pub async fn register(agent: &Agent) -> Result<GattRegistration, PlatformError> {
    let session = Session::new()
        .await
        .map_err(PlatformError::at("session setup"))?;
    let adapter = session
        .default_adapter()
        .await
        .map_err(PlatformError::at("adapter lookup"))?;
    adapter
        .set_powered(true)
        .await
        .map_err(PlatformError::at("adapter power-on"))?;
    let address = adapter
        .address()
        .await
        .map_err(PlatformError::at("adapter query"))?;
    info!("Using adapter {} ({})", adapter.name(), address);

    let publisher = agent.service().publisher().clone();
    let router = agent.router();
    let characteristics = agent
        .bindings()
        .iter()
        .map(|binding| characteristic(binding, &publisher, &router))
        .collect();

    let app = Application {
        services: vec![Service {
            uuid: SERVICE_UUID,
            primary: true,
            characteristics,
            ..Default::default()
        }],
        ..Default::default()
    };
    let application = adapter
        .serve_gatt_application(app)
        .await
        .map_err(PlatformError::at("GATT registration"))?;
    info!("GATT service {} registered", SERVICE_UUID);

    let name = agent.identity().name().to_string();
    let adv = Advertisement {
        advertisement_type: Type::Peripheral,
        service_uuids: vec![SERVICE_UUID].into_iter().collect(),
        discoverable: Some(true),
        local_name: Some(name.clone()),
        ..Default::default()
    };
    let advertisement = adapter
        .advertise(adv)
        .await
        .map_err(PlatformError::at("advertisement"))?;
    info!("Advertising as {}", name);

    Ok(GattRegistration {
        _session: session,
        _adapter: adapter,
        application,
        advertisement: Some(advertisement),
    })
}

fn characteristic(
    binding: &CharacteristicBinding,
    publisher: &Arc<StatusPublisher>,
    router: &RouterHandle,
) -> Characteristic {
    let uuid = binding.uuid;
    let perms = binding.permissions;

    let read = perms.read.then(|| {
        let publisher = publisher.clone();
        CharacteristicRead {
            read: true,
            fun: Box::new(move |_req| {
                let publisher = publisher.clone();
                async move {
                    match publisher.value_for(uuid) {
                        Some(value) => Ok(value.read().await),
                        None => Err(ReqError::NotSupported),
                    }
                }
                .boxed()
            }),
            ..Default::default()
        }
    });

    let write = perms.is_writable().then(|| {
        let router = router.clone();
        CharacteristicWrite {
            write: perms.write,
            write_without_response: perms.write_without_response,
            method: CharacteristicWriteMethod::Fun(Box::new(move |value, _req| {
                let router = router.clone();
                async move {
                    // Results travel over the notify characteristics only.
                    if let Err(e) = router.dispatch(uuid, value).await {
                        warn!("Dropped write: {}", e);
                    }
                    Ok(())
                }
                .boxed()
            })),
            ..Default::default()
        }
    });

    let notify = perms.notify.then(|| {
        let publisher = publisher.clone();
        CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                let publisher = publisher.clone();
                async move {
                    tokio::spawn(forward_notifications(publisher, uuid, notifier));
                }
                .boxed()
            })),
            ..Default::default()
        }
    });

    Characteristic {
        uuid,
        read,
        write,
        notify,
        ..Default::default()
    }
}

impl NotifySession for CharacteristicNotifier {
    type Error = bluer::Error;

    async fn stopped(&mut self) {
        CharacteristicNotifier::stopped(self).await
    }

    async fn notify(&mut self, value: Vec<u8>) -> bluer::Result<()> {
        CharacteristicNotifier::notify(self, value).await
    }
}

/// Push every value published on `uuid` to one subscribed central.
async fn forward_notifications(
    publisher: Arc<StatusPublisher>,
    uuid: Uuid,
    mut notifier: CharacteristicNotifier,
) {
    let Some(value) = publisher.value_for(uuid) else {
        return;
    };
    debug!("Central subscribed to {}", uuid);
    value.forward(&mut notifier).await;
    debug!("Central unsubscribed from {}", uuid);
}
