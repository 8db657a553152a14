use crate::models::order::Order;
use crate::models::shipment::Shipment;

/// Partitions an order into one pending shipment per seller, in first-seen
/// seller order. Post-condition: every line item lands in exactly one
/// shipment and no shipment mixes sellers.
pub fn split_order(order: &Order) -> Vec<Shipment> {
    let mut shipments: Vec<Shipment> = Vec::new();

    for item in &order.items {
        match shipments
            .iter_mut()
            .find(|shipment| shipment.seller_id == item.seller_id)
        {
            Some(shipment) => shipment.items.push(item.clone()),
            None => shipments.push(Shipment::new(
                order.id,
                item.seller_id,
                vec![item.clone()],
                order.delivery_address.clone(),
                order.delivery_note.clone(),
            )),
        }
    }

    shipments
}
