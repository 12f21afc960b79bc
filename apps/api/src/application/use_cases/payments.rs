use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use verdant_types::{
    OrderPurpose, OrderResponse, OrderStatus, PaymentMethod, SignatureError, SubscriptionAction,
    SubscriptionStatus, VerifyPaymentRequest, VerifyPaymentResponse, verify_payment_signature,
};

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::{GatewayOrderRequest, PaymentGateway},
        use_cases::{
            plans::PlanRepo,
            subscriptions::{
                LifecyclePolicy, SubscriptionEventRepo, SubscriptionRepo, ensure_transition,
                record_event, save_guarded,
            },
        },
    },
    domain::entities::{
        payment_order::PaymentOrder,
        plan::Plan,
        subscription::Subscription,
        subscription_event::{NewSubscriptionEvent, SubscriptionEventType},
    },
};

#[async_trait]
pub trait PaymentOrderRepo: Send + Sync {
    async fn create(&self, order: &PaymentOrder) -> AppResult<()>;
    async fn get_by_gateway_order_id(&self, razorpay_order_id: &str)
    -> AppResult<Option<PaymentOrder>>;
    async fn payment_id_used(&self, razorpay_payment_id: &str) -> AppResult<bool>;
    /// `created -> paid`. False if the order was no longer `created`.
    async fn mark_paid(
        &self,
        id: Uuid,
        razorpay_payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> AppResult<bool>;
    /// `created -> failed`. False if the order was no longer `created`.
    async fn mark_failed(&self, id: Uuid) -> AppResult<bool>;
    /// `paid -> created`, releasing the payment id. Undoes `mark_paid` when the
    /// subscription write that should follow it does not go through.
    async fn reopen(&self, id: Uuid) -> AppResult<bool>;
}

pub struct PaymentUseCases {
    orders: Arc<dyn PaymentOrderRepo>,
    subs: Arc<dyn SubscriptionRepo>,
    events: Arc<dyn SubscriptionEventRepo>,
    plans: Arc<dyn PlanRepo>,
    gateway: Arc<dyn PaymentGateway>,
    key_secret: SecretString,
    policy: LifecyclePolicy,
}

impl PaymentUseCases {
    pub fn new(
        orders: Arc<dyn PaymentOrderRepo>,
        subs: Arc<dyn SubscriptionRepo>,
        events: Arc<dyn SubscriptionEventRepo>,
        plans: Arc<dyn PlanRepo>,
        gateway: Arc<dyn PaymentGateway>,
        key_secret: SecretString,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            orders,
            subs,
            events,
            plans,
            gateway,
            key_secret,
            policy,
        }
    }

    /// Open a checkout for `plan_id`.
    ///
    /// Without a live subscription this creates a `pending` one. A live
    /// `pending` one from an abandoned checkout is cancelled and replaced.
    /// An `active` or `grace_period` one inside the renewal window gets a
    /// renewal order; otherwise the checkout is refused.
    #[instrument(skip(self))]
    pub async fn create_order(&self, user_id: Uuid, plan_id: Uuid) -> AppResult<OrderResponse> {
        let plan = match self.plans.get_by_id(plan_id).await? {
            Some(plan) if plan.is_active => plan,
            _ => return Err(AppError::NotFound),
        };
        let now = Utc::now();

        let (subscription_id, purpose, mut pending) =
            match self.subs.get_live_for_user(user_id).await? {
                Some(live) if live.status == SubscriptionStatus::Pending => {
                    self.supersede(live, user_id, now).await?;
                    let sub = self.open_pending(user_id, &plan, now).await?;
                    (sub.id, OrderPurpose::NewSubscription, Some(sub))
                }
                Some(live)
                    if live.allows(SubscriptionAction::Renew, now, self.policy.renewal_window_days) =>
                {
                    if live.plan_id != plan.id
                        && !live.allows(
                            SubscriptionAction::ChangePlan,
                            now,
                            self.policy.renewal_window_days,
                        )
                    {
                        return Err(AppError::ActionNotAllowed {
                            action: SubscriptionAction::ChangePlan,
                            status: live.status,
                        });
                    }
                    (live.id, OrderPurpose::Renewal, None)
                }
                Some(live) => {
                    return Err(AppError::Conflict(format!(
                        "Subscription is {} and can be renewed from {} days before it ends",
                        live.status, self.policy.renewal_window_days
                    )));
                }
                None => {
                    let sub = self.open_pending(user_id, &plan, now).await?;
                    (sub.id, OrderPurpose::NewSubscription, Some(sub))
                }
            };

        let request = GatewayOrderRequest {
            amount_paise: plan.price_paise,
            currency: plan.currency.clone(),
            receipt: format!("rcpt_{}", subscription_id.simple()),
            notes: HashMap::from([
                ("subscription_id".to_string(), subscription_id.to_string()),
                ("user_id".to_string(), user_id.to_string()),
                ("plan_id".to_string(), plan.id.to_string()),
                ("purpose".to_string(), purpose.to_string()),
            ]),
        };
        let gateway_order = match self.gateway.create_order(&request).await {
            Ok(order) => order,
            Err(e) => {
                error!(subscription_id = %subscription_id, error = %e, "Gateway order creation failed");
                if let Some(sub) = pending {
                    self.fail_pending(sub, json!({ "reason": "gateway_error" })).await;
                }
                return Err(e);
            }
        };

        if let Some(sub) = pending.as_mut() {
            sub.razorpay_order_id = Some(gateway_order.id.clone());
            save_guarded(self.subs.as_ref(), sub, SubscriptionStatus::Pending).await?;
        }

        let order = PaymentOrder {
            id: Uuid::new_v4(),
            razorpay_order_id: gateway_order.id.clone(),
            user_id,
            plan_id: plan.id,
            subscription_id,
            purpose,
            amount_paise: gateway_order.amount_paise,
            currency: gateway_order.currency.clone(),
            status: OrderStatus::Created,
            razorpay_payment_id: None,
            created_at: now,
            paid_at: None,
        };
        self.orders.create(&order).await?;

        info!(order_id = %order.razorpay_order_id, subscription_id = %subscription_id, purpose = %purpose, "Checkout order created");
        Ok(OrderResponse {
            order_id: order.razorpay_order_id,
            amount: order.amount_paise,
            currency: order.currency,
            key_id: self.gateway.key_id().to_string(),
            subscription_id,
            purpose,
        })
    }

    /// Check the checkout signature and, if it holds, activate or renew.
    ///
    /// A bad signature fails the order (and a pending subscription).
    /// Payment ids are single-use.
    #[instrument(skip(self, req), fields(order_id = %req.razorpay_order_id))]
    pub async fn verify(
        &self,
        user_id: Uuid,
        req: VerifyPaymentRequest,
    ) -> AppResult<VerifyPaymentResponse> {
        let order = self
            .orders
            .get_by_gateway_order_id(&req.razorpay_order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(AppError::NotFound)?;
        if order.status != OrderStatus::Created {
            return Err(AppError::Conflict("Order has already been processed".into()));
        }
        if self.orders.payment_id_used(&req.razorpay_payment_id).await? {
            return Err(AppError::Conflict("Payment has already been used".into()));
        }
        let mut sub = self
            .subs
            .get_by_id(order.subscription_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if let Err(e) = verify_payment_signature(
            self.key_secret.expose_secret(),
            &order.razorpay_order_id,
            &req.razorpay_payment_id,
            &req.razorpay_signature,
        ) {
            warn!(payment_id = %req.razorpay_payment_id, reason = %e, "Payment signature rejected");
            self.reject(&order, sub, &req.razorpay_payment_id, e).await;
            return Err(AppError::PaymentVerificationFailed);
        }

        let now = Utc::now();
        let plan = self
            .plans
            .get_by_id(order.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let previous = sub.status;
        let event_type = match order.purpose {
            OrderPurpose::NewSubscription => {
                ensure_transition(previous, SubscriptionStatus::Active)?;
                sub.status = SubscriptionStatus::Active;
                sub.plan_id = plan.id;
                sub.start_date = now;
                sub.end_date = now + plan.duration();
                SubscriptionEventType::Activated
            }
            OrderPurpose::Renewal => {
                // Window was checked when the order was opened
                if !previous.has_access() {
                    return Err(AppError::ActionNotAllowed {
                        action: SubscriptionAction::Renew,
                        status: previous,
                    });
                }
                if previous != SubscriptionStatus::Active {
                    ensure_transition(previous, SubscriptionStatus::Active)?;
                }
                sub.renew(&plan, now);
                SubscriptionEventType::Renewed
            }
        };
        sub.payment_method = PaymentMethod::Online;
        sub.transaction_id = Some(req.razorpay_payment_id.clone());
        sub.razorpay_order_id = Some(order.razorpay_order_id.clone());
        sub.razorpay_payment_id = Some(req.razorpay_payment_id.clone());
        sub.razorpay_signature = Some(req.razorpay_signature.clone());

        // Claim the order first so two verifies of it can't both credit.
        if !self
            .orders
            .mark_paid(order.id, &req.razorpay_payment_id, now)
            .await?
        {
            return Err(AppError::Conflict("Order has already been processed".into()));
        }
        if let Err(e) = save_guarded(self.subs.as_ref(), &mut sub, previous).await {
            match self.orders.reopen(order.id).await {
                Ok(_) => {
                    warn!(order_id = %order.razorpay_order_id, "Subscription write failed, order reopened for retry")
                }
                Err(reopen_err) => {
                    error!(order_id = %order.razorpay_order_id, error = ?reopen_err, "Failed to reopen order after subscription write failed")
                }
            }
            return Err(e);
        }

        let mut event = NewSubscriptionEvent::new(sub.id, event_type)
            .by(Some(user_id))
            .with_metadata(json!({
                "order_id": order.razorpay_order_id,
                "payment_id": req.razorpay_payment_id,
                "amount_paise": order.amount_paise,
                "end_date": sub.end_date,
            }));
        if previous != sub.status {
            event = event.transition(previous, sub.status);
        }
        record_event(self.events.as_ref(), event).await;

        info!(subscription_id = %sub.id, purpose = %order.purpose, "Payment verified");
        Ok(VerifyPaymentResponse {
            success: true,
            subscription: sub.to_details(Some(plan.name), now, self.policy.renewal_window_days),
        })
    }

    async fn open_pending(
        &self,
        user_id: Uuid,
        plan: &Plan,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let sub = Subscription::new(
            user_id,
            plan,
            SubscriptionStatus::Pending,
            now,
            PaymentMethod::Online,
            now,
        );
        self.subs.create(&sub).await?;
        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::Created)
                .by(Some(user_id))
                .with_metadata(json!({ "plan_id": plan.id, "payment_method": sub.payment_method })),
        )
        .await;
        Ok(sub)
    }

    /// Cancel an abandoned pending checkout so a new one can take the slot.
    async fn supersede(
        &self,
        mut sub: Subscription,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sub.status = SubscriptionStatus::Cancelled;
        sub.cancelled_at = Some(now);
        sub.cancellation_reason = Some("Superseded by a new checkout".into());
        save_guarded(self.subs.as_ref(), &mut sub, SubscriptionStatus::Pending).await?;
        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::Cancelled)
                .transition(SubscriptionStatus::Pending, SubscriptionStatus::Cancelled)
                .by(Some(user_id))
                .with_metadata(json!({ "reason": sub.cancellation_reason })),
        )
        .await;
        Ok(())
    }

    /// Best effort: the caller is already returning an error.
    async fn fail_pending(&self, mut sub: Subscription, metadata: serde_json::Value) {
        if sub.status != SubscriptionStatus::Pending {
            return;
        }
        sub.status = SubscriptionStatus::Failed;
        if let Err(e) = save_guarded(self.subs.as_ref(), &mut sub, SubscriptionStatus::Pending).await {
            error!(subscription_id = %sub.id, error = ?e, "Failed to mark subscription failed");
            return;
        }
        record_event(
            self.events.as_ref(),
            NewSubscriptionEvent::new(sub.id, SubscriptionEventType::PaymentFailed)
                .transition(SubscriptionStatus::Pending, SubscriptionStatus::Failed)
                .with_metadata(metadata),
        )
        .await;
    }

    async fn reject(
        &self,
        order: &PaymentOrder,
        sub: Subscription,
        payment_id: &str,
        reason: SignatureError,
    ) {
        if let Err(e) = self.orders.mark_failed(order.id).await {
            error!(order_id = %order.razorpay_order_id, error = ?e, "Failed to mark order failed");
        }
        let metadata = json!({
            "order_id": order.razorpay_order_id,
            "payment_id": payment_id,
            "reason": reason.to_string(),
        });
        match order.purpose {
            OrderPurpose::NewSubscription => self.fail_pending(sub, metadata).await,
            OrderPurpose::Renewal => {
                record_event(
                    self.events.as_ref(),
                    NewSubscriptionEvent::new(sub.id, SubscriptionEventType::PaymentFailed)
                        .with_metadata(metadata),
                )
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use verdant_types::sign_payment;

    use super::*;
    use crate::test_utils::{
        FailingGateway, InMemoryPaymentOrderRepo, InMemoryPlanRepo, InMemorySubscriptionEventRepo,
        InMemorySubscriptionRepo, RacingSubscriptionRepo, RecordingGateway, create_test_plan,
        create_test_subscription,
    };

    const SECRET: &str = "rzp_secret";

    struct Fixture {
        payments: PaymentUseCases,
        orders: Arc<InMemoryPaymentOrderRepo>,
        subs: Arc<InMemorySubscriptionRepo>,
        racing: Arc<RacingSubscriptionRepo>,
        events: Arc<InMemorySubscriptionEventRepo>,
        plan: Plan,
        other_plan: Plan,
        user_id: Uuid,
    }

    fn fixture(
        gateway: Arc<dyn PaymentGateway>,
        seed: impl FnOnce(Uuid, &Plan) -> Vec<Subscription>,
    ) -> Fixture {
        let plan = create_test_plan(|_| {});
        let other_plan = create_test_plan(|p| {
            p.name = "Orchard".into();
            p.price_paise = 499_900;
            p.duration_days = 365;
        });
        let user_id = Uuid::new_v4();
        let plans = Arc::new(InMemoryPlanRepo::with_plans(vec![
            plan.clone(),
            other_plan.clone(),
        ]));
        let subs = Arc::new(InMemorySubscriptionRepo::with_subscriptions(seed(
            user_id, &plan,
        )));
        let racing = Arc::new(RacingSubscriptionRepo::new(subs.clone()));
        let events = Arc::new(InMemorySubscriptionEventRepo::new());
        let orders = Arc::new(InMemoryPaymentOrderRepo::new());

        Fixture {
            payments: PaymentUseCases::new(
                orders.clone(),
                racing.clone(),
                events.clone(),
                plans,
                gateway,
                SecretString::new(SECRET.into()),
                LifecyclePolicy::default(),
            ),
            orders,
            subs,
            racing,
            events,
            plan,
            other_plan,
            user_id,
        }
    }

    fn signed(order_id: &str, payment_id: &str) -> VerifyPaymentRequest {
        VerifyPaymentRequest {
            razorpay_order_id: order_id.to_string(),
            razorpay_payment_id: payment_id.to_string(),
            razorpay_signature: sign_payment(SECRET, order_id, payment_id),
        }
    }

    #[tokio::test]
    async fn test_create_order_opens_pending_subscription() {
        let gateway = Arc::new(RecordingGateway::default());
        let f = fixture(gateway.clone(), |_, _| vec![]);

        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        assert_eq!(order.order_id, "order_test_1");
        assert_eq!(order.amount, f.plan.price_paise);
        assert_eq!(order.key_id, "rzp_test_recording");
        assert_eq!(order.purpose, OrderPurpose::NewSubscription);

        let sub = f.subs.get(order.subscription_id).unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.razorpay_order_id.as_deref(), Some("order_test_1"));

        let requests = gateway.requests.lock().unwrap();
        assert_eq!(
            requests[0].notes.get("subscription_id"),
            Some(&order.subscription_id.to_string())
        );
    }

    #[tokio::test]
    async fn test_second_checkout_supersedes_pending() {
        let f = fixture(Arc::new(RecordingGateway::default()), |_, _| vec![]);

        let first = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();
        let second = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        assert_ne!(first.subscription_id, second.subscription_id);
        assert_eq!(
            f.subs.get(first.subscription_id).unwrap().status,
            SubscriptionStatus::Cancelled
        );
        assert_eq!(
            f.subs.get(second.subscription_id).unwrap().status,
            SubscriptionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_create_order_refused_for_active_outside_window() {
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| {
                s.end_date = Utc::now() + Duration::days(20);
            })]
        });

        assert!(matches!(
            f.payments.create_order(f.user_id, f.plan.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_gateway_failure_fails_pending() {
        let f = fixture(Arc::new(FailingGateway), |_, _| vec![]);

        assert!(matches!(
            f.payments.create_order(f.user_id, f.plan.id).await,
            Err(AppError::Gateway(_))
        ));

        let subs = f.subs.subscriptions.lock().unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs.values().all(|s| s.status == SubscriptionStatus::Failed));
    }

    #[tokio::test]
    async fn test_archived_plan_cannot_be_bought() {
        let f = fixture(Arc::new(RecordingGateway::default()), |_, _| vec![]);
        assert!(matches!(
            f.payments.create_order(f.user_id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_verify_activates_and_blocks_replay() {
        let f = fixture(Arc::new(RecordingGateway::default()), |_, _| vec![]);
        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        let res = f
            .payments
            .verify(f.user_id, signed(&order.order_id, "pay_1"))
            .await
            .unwrap();

        assert!(res.success);
        assert_eq!(res.subscription.status, SubscriptionStatus::Active);
        assert_eq!(res.subscription.days_remaining, 30);
        assert_eq!(res.subscription.razorpay_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(
            f.orders.find(&order.order_id).unwrap().status,
            OrderStatus::Paid
        );
        assert_eq!(
            f.events.types_for(order.subscription_id),
            vec!["created", "activated"]
        );

        assert!(matches!(
            f.payments
                .verify(f.user_id, signed(&order.order_id, "pay_1"))
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_forged_signature_fails_order_and_subscription() {
        let f = fixture(Arc::new(RecordingGateway::default()), |_, _| vec![]);
        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        let mut req = signed(&order.order_id, "pay_1");
        req.razorpay_signature = sign_payment("wrong_secret", &order.order_id, "pay_1");

        assert!(matches!(
            f.payments.verify(f.user_id, req).await,
            Err(AppError::PaymentVerificationFailed)
        ));
        assert_eq!(
            f.orders.find(&order.order_id).unwrap().status,
            OrderStatus::Failed
        );
        assert_eq!(
            f.subs.get(order.subscription_id).unwrap().status,
            SubscriptionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_verify_other_users_order_is_not_found() {
        let f = fixture(Arc::new(RecordingGateway::default()), |_, _| vec![]);
        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        assert!(matches!(
            f.payments
                .verify(Uuid::new_v4(), signed(&order.order_id, "pay_1"))
                .await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_renewal_checkout_extends_from_end_date() {
        let end = Utc::now() + Duration::days(4);
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| s.end_date = end)]
        });

        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();
        assert_eq!(order.purpose, OrderPurpose::Renewal);

        let res = f
            .payments
            .verify(f.user_id, signed(&order.order_id, "pay_renew"))
            .await
            .unwrap();

        assert_eq!(res.subscription.end_date, end + f.plan.duration());
        assert_eq!(res.subscription.renewal_count, 1);
        assert_eq!(f.events.types_for(order.subscription_id), vec!["renewed"]);
    }

    #[tokio::test]
    async fn test_forged_renewal_keeps_subscription_active() {
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| {
                s.end_date = Utc::now() + Duration::days(2);
            })]
        });
        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        let mut req = signed(&order.order_id, "pay_x");
        req.razorpay_signature = "00".repeat(32);

        assert!(f.payments.verify(f.user_id, req).await.is_err());
        assert_eq!(
            f.subs.get(order.subscription_id).unwrap().status,
            SubscriptionStatus::Active
        );
        assert_eq!(
            f.events.types_for(order.subscription_id),
            vec!["payment_failed"]
        );
    }

    #[tokio::test]
    async fn test_lost_status_race_reopens_order_for_retry() {
        let end = Utc::now() + Duration::days(3);
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| s.end_date = end)]
        });
        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();

        f.racing.lose_next_write();
        assert!(matches!(
            f.payments
                .verify(f.user_id, signed(&order.order_id, "pay_race"))
                .await,
            Err(AppError::Conflict(_))
        ));

        let stored = f.orders.find(&order.order_id).unwrap();
        assert_eq!(stored.status, OrderStatus::Created);
        assert_eq!(stored.razorpay_payment_id, None);
        assert_eq!(f.subs.get(order.subscription_id).unwrap().renewal_count, 0);

        // Same captured payment goes through on retry
        let res = f
            .payments
            .verify(f.user_id, signed(&order.order_id, "pay_race"))
            .await
            .unwrap();
        assert_eq!(res.subscription.renewal_count, 1);
        assert_eq!(res.subscription.end_date, end + f.plan.duration());
        assert_eq!(
            f.orders.find(&order.order_id).unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_every_paid_renewal_order_is_credited() {
        let end = Utc::now() + Duration::days(3);
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| s.end_date = end)]
        });
        let first = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();
        let second = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();
        assert_eq!(second.purpose, OrderPurpose::Renewal);

        f.payments
            .verify(f.user_id, signed(&first.order_id, "pay_a"))
            .await
            .unwrap();
        // Renewal window is closed now, but the second payment was captured too
        let res = f
            .payments
            .verify(f.user_id, signed(&second.order_id, "pay_b"))
            .await
            .unwrap();

        assert_eq!(res.subscription.renewal_count, 2);
        assert_eq!(res.subscription.end_date, end + f.plan.duration() * 2);
        assert_eq!(
            f.orders.find(&second.order_id).unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_grace_period_checkout_cannot_switch_plan() {
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| {
                s.status = SubscriptionStatus::GracePeriod;
                s.end_date = Utc::now() - Duration::days(1);
            })]
        });

        assert!(matches!(
            f.payments.create_order(f.user_id, f.other_plan.id).await,
            Err(AppError::ActionNotAllowed {
                action: SubscriptionAction::ChangePlan,
                status: SubscriptionStatus::GracePeriod
            })
        ));

        let order = f.payments.create_order(f.user_id, f.plan.id).await.unwrap();
        assert_eq!(order.purpose, OrderPurpose::Renewal);
    }

    #[tokio::test]
    async fn test_active_renewal_checkout_may_switch_plan() {
        let f = fixture(Arc::new(RecordingGateway::default()), |user_id, plan| {
            vec![create_test_subscription(user_id, plan, |s| {
                s.end_date = Utc::now() + Duration::days(2);
            })]
        });

        let order = f
            .payments
            .create_order(f.user_id, f.other_plan.id)
            .await
            .unwrap();
        let res = f
            .payments
            .verify(f.user_id, signed(&order.order_id, "pay_up"))
            .await
            .unwrap();

        assert_eq!(res.subscription.plan_id, f.other_plan.id);
        assert_eq!(order.amount, f.other_plan.price_paise);
    }
}
