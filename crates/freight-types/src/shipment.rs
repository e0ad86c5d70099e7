//! Physical consolidation units: boxes and containers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::order::{BoxId, ContainerId};

/// A box groups several orders for shipment.
///
/// Orders reference their box through `Order::box_id`; the box does not own
/// the lifecycle of those orders, only their physical grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingBox {
	#[serde(alias = "boxId", alias = "box_id")]
	pub id: BoxId,
	/// Ordinal in the box state space (see [`crate::BoxState`]).
	pub state: i32,
	/// Set when the box is loaded onto a container.
	#[serde(default, alias = "containerId")]
	pub container_id: Option<ContainerId>,
	#[serde(alias = "updatedAt")]
	pub updated_at: DateTime<Utc>,
}

impl ShippingBox {
	pub fn new(id: BoxId) -> Self {
		Self {
			id,
			state: crate::BoxState::Packing as i32,
			container_id: None,
			updated_at: Utc::now(),
		}
	}

	pub fn with_state(mut self, state: i32) -> Self {
		self.state = state;
		self
	}

	pub fn in_container(mut self, container_id: ContainerId) -> Self {
		self.container_id = Some(container_id);
		self
	}
}

/// A shipping container grouping boxes, carrying carrier tracking metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
	#[serde(alias = "containerId", alias = "container_id")]
	pub id: ContainerId,
	pub state: i32,
	#[serde(default, alias = "trackingNumber")]
	pub tracking_number: Option<String>,
	#[serde(default, alias = "trackingCompany")]
	pub tracking_company: Option<String>,
	#[serde(default, alias = "arriveDate")]
	pub arrive_date: Option<NaiveDate>,
	#[serde(default, alias = "trackingLink")]
	pub tracking_link: Option<String>,
	#[serde(alias = "updatedAt")]
	pub updated_at: DateTime<Utc>,
}

impl Container {
	pub fn new(id: ContainerId) -> Self {
		Self {
			id,
			state: crate::ContainerState::Loading as i32,
			tracking_number: None,
			tracking_company: None,
			arrive_date: None,
			tracking_link: None,
			updated_at: Utc::now(),
		}
	}

	pub fn with_tracking(
		mut self,
		number: impl Into<String>,
		company: impl Into<String>,
		link: Option<String>,
		arrive_date: Option<NaiveDate>,
	) -> Self {
		self.tracking_number = Some(number.into());
		self.tracking_company = Some(company.into());
		self.tracking_link = link;
		self.arrive_date = arrive_date;
		self
	}
}

/// Carrier tracking metadata that applies to an order through its container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
	pub container_id: ContainerId,
	pub tracking_number: Option<String>,
	pub tracking_company: Option<String>,
	pub arrive_date: Option<NaiveDate>,
	pub tracking_link: Option<String>,
}

impl From<&Container> for TrackingInfo {
	fn from(container: &Container) -> Self {
		Self {
			container_id: container.id,
			tracking_number: container.tracking_number.clone(),
			tracking_company: container.tracking_company.clone(),
			arrive_date: container.arrive_date,
			tracking_link: container.tracking_link.clone(),
		}
	}
}
